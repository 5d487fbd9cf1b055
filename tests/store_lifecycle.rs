//! Integration tests for the listing cache and bookmark store.
//!
//! Each test creates its own SQLite database (in-memory unless the test is
//! about surviving a reopen).

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use reelfeed::model::Item;
use reelfeed::storage::Database;

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn movie(id: i64, title: &str) -> Item {
    Item {
        id,
        title: title.to_string(),
        overview: String::new(),
        poster_ref: None,
        release_date: None,
        score: Some(6.5),
    }
}

fn ids(items: &[Item]) -> Vec<i64> {
    items.iter().map(|i| i.id).collect()
}

// ============================================================================
// Category Cache Tests
// ============================================================================

#[tokio::test]
async fn test_freshness_window() {
    let db = test_db().await;
    let written = Utc::now();
    let ttl = Duration::hours(24);

    db.replace_category("trending", &[movie(1, "Dune")], written)
        .await
        .unwrap();

    assert!(db.is_fresh("trending", written + Duration::seconds(1), ttl).await);
    assert!(!db.is_fresh("trending", written + Duration::hours(25), ttl).await);
    assert!(!db.is_fresh("popular", written, ttl).await);
}

#[tokio::test]
async fn test_replace_is_exclusive_per_category() {
    let db = test_db().await;
    let now = Utc::now();

    db.replace_category("nowPlaying", &[movie(10, "Heat"), movie(11, "Ronin")], now)
        .await
        .unwrap();
    db.replace_category("trending", &[movie(1, "Dune")], now)
        .await
        .unwrap();
    db.replace_category("trending", &[movie(2, "Alien")], now)
        .await
        .unwrap();

    assert_eq!(ids(&db.read_category("trending").await), vec![2]);
    assert_eq!(ids(&db.read_category("nowPlaying").await), vec![10, 11]);
}

#[tokio::test]
async fn test_same_item_in_two_categories() {
    let db = test_db().await;
    let now = Utc::now();

    db.replace_category("trending", &[movie(1, "Dune")], now)
        .await
        .unwrap();
    db.replace_category("popular", &[movie(1, "Dune")], now)
        .await
        .unwrap();
    db.replace_category("popular", &[], now).await.unwrap();

    assert_eq!(ids(&db.read_category("trending").await), vec![1]);
    assert!(db.read_category("popular").await.is_empty());
}

#[tokio::test]
async fn test_concurrent_writes_to_different_categories() {
    let dir = std::env::temp_dir().join(format!("reelfeed_concurrent_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let db = Database::open(dir.join("reelfeed.db").to_str().unwrap())
        .await
        .unwrap();
    let now = Utc::now();
    let trending: Vec<Item> = (1..=20).map(|id| movie(id, "t")).collect();
    let popular: Vec<Item> = (100..=120).map(|id| movie(id, "p")).collect();

    let (a, b) = tokio::join!(
        db.replace_category("trending", &trending, now),
        db.replace_category("popular", &popular, now),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(db.read_category("trending").await.len(), 20);
    assert_eq!(db.read_category("popular").await.len(), 21);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_eviction_keeps_fresh_records() {
    let db = test_db().await;
    let now = Utc::now();

    db.replace_category("trending", &[movie(1, "Dune")], now - Duration::hours(30))
        .await
        .unwrap();
    db.replace_category("popular", &[movie(2, "Alien")], now)
        .await
        .unwrap();

    let evicted = db
        .evict_stale_categories(now, Duration::hours(24))
        .await
        .unwrap();

    assert_eq!(evicted, 1);
    assert!(db.read_category("trending").await.is_empty());
    assert_eq!(ids(&db.read_category("popular").await), vec![2]);
}

#[tokio::test]
async fn test_cache_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("reelfeed_store_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("reelfeed.db");
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).await.unwrap();
        db.replace_category("popular", &[movie(5, "Jaws"), movie(6, "Up")], Utc::now())
            .await
            .unwrap();
        db.add_bookmark(&movie(5, "Jaws")).await.unwrap();
    }

    let db = Database::open(path_str).await.unwrap();
    assert_eq!(ids(&db.read_category("popular").await), vec![5, 6]);
    assert!(db.is_bookmarked(5).await.unwrap());

    std::fs::remove_dir_all(&dir).ok();
}

// ============================================================================
// Bookmark Tests
// ============================================================================

#[tokio::test]
async fn test_bookmark_round_trip() {
    let db = test_db().await;
    let item = movie(42, "Arrival");

    db.add_bookmark(&item).await.unwrap();
    assert!(db.is_bookmarked(42).await.unwrap());

    assert!(db.remove_bookmark(42).await.unwrap());
    assert!(!db.is_bookmarked(42).await.unwrap());
}

#[tokio::test]
async fn test_bookmarks_list_newest_first() {
    let db = test_db().await;
    for id in [1, 2, 3] {
        db.add_bookmark(&movie(id, "m")).await.unwrap();
    }

    let listed: Vec<i64> = db
        .list_bookmarks()
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.item.id)
        .collect();
    assert_eq!(listed, vec![3, 2, 1]);
}

#[tokio::test]
async fn test_bookmarks_never_expire() {
    let db = test_db().await;
    let now = Utc::now();
    db.replace_category("trending", &[movie(1, "Dune")], now - Duration::days(10))
        .await
        .unwrap();
    db.add_bookmark(&movie(1, "Dune")).await.unwrap();

    db.evict_stale_categories(now, Duration::hours(24))
        .await
        .unwrap();

    let bookmarks = db.list_bookmarks().await.unwrap();
    assert_eq!(bookmarks.len(), 1);
    assert_eq!(bookmarks[0].item.title, "Dune");
}

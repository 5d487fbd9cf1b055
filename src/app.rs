//! Application wiring: one store, one remote, one probe, four feeds.
//!
//! The presentation layer holds an [`App`], subscribes to the feeds it shows,
//! and issues `load`/`load_more`/bookmark commands through it.

use secrecy::SecretString;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::connectivity::ConnectivityProbe;
use crate::feed::{CategoryFeed, ImagePrefetcher, SearchFeed};
use crate::model::{Category, Item};
use crate::remote::{RemoteSource, TmdbClient};
use crate::storage::{Bookmark, Database, DatabaseError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct App {
    db: Database,
    trending: Arc<CategoryFeed>,
    now_playing: Arc<CategoryFeed>,
    popular: Arc<CategoryFeed>,
    search: SearchFeed,
    prefetcher: Option<ImagePrefetcher>,
}

impl App {
    /// Build the production wiring: HTTP remote plus poster prefetching.
    pub fn new(
        config: &Config,
        token: SecretString,
        db: Database,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(std::time::Duration::from_secs(30))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()?;

        let remote = Arc::new(TmdbClient::new(
            http_client.clone(),
            config.api_base_url.clone(),
            token,
            config.language.clone(),
            config.request_timeout(),
        ));
        let prefetcher = ImagePrefetcher::with_limits(
            http_client,
            config.image_base_url.clone(),
            config.prefetch_concurrency,
            config.image_cache_capacity,
        );

        Ok(Self::from_parts(config, db, remote, probe, Some(prefetcher)))
    }

    /// Wire feeds over an arbitrary remote source.
    pub fn from_parts(
        config: &Config,
        db: Database,
        remote: Arc<dyn RemoteSource>,
        probe: Arc<dyn ConnectivityProbe>,
        prefetcher: Option<ImagePrefetcher>,
    ) -> Self {
        let make_feed = |category: Category| {
            let feed = CategoryFeed::new(category, remote.clone(), db.clone(), probe.clone())
                .with_ttl(config.cache_ttl());
            let feed = match &prefetcher {
                Some(p) => feed.with_prefetcher(p.clone()),
                None => feed,
            };
            Arc::new(feed)
        };

        let trending = make_feed(Category::Trending);
        let now_playing = make_feed(Category::NowPlaying);
        let popular = make_feed(Category::Popular);
        let search = SearchFeed::new(make_feed(Category::Search), Arc::clone(&popular))
            .with_debounce(config.search_debounce());

        Self {
            db,
            trending,
            now_playing,
            popular,
            search,
            prefetcher,
        }
    }

    pub fn feed(&self, category: Category) -> &Arc<CategoryFeed> {
        match category {
            Category::Trending => &self.trending,
            Category::NowPlaying => &self.now_playing,
            Category::Popular => &self.popular,
            Category::Search => self.search.results(),
        }
    }

    pub fn search(&self) -> &SearchFeed {
        &self.search
    }

    pub fn prefetcher(&self) -> Option<&ImagePrefetcher> {
        self.prefetcher.as_ref()
    }

    /// Load both home sections concurrently.
    pub async fn load_home(&self) {
        tokio::join!(self.trending.load(), self.now_playing.load());
    }

    /// Flip an item's bookmark; returns the new state.
    pub async fn toggle_bookmark(&self, item: &Item) -> Result<bool, DatabaseError> {
        let bookmarked = self.db.toggle_bookmark(item).await?;
        tracing::info!(item_id = item.id, bookmarked, "Toggled bookmark");
        Ok(bookmarked)
    }

    pub async fn is_bookmarked(&self, item_id: i64) -> Result<bool, DatabaseError> {
        self.db.is_bookmarked(item_id).await
    }

    pub async fn bookmarks(&self) -> Result<Vec<Bookmark>, DatabaseError> {
        self.db.list_bookmarks().await
    }

    /// Find an item by id among what the feeds show, then in the cache.
    pub async fn find_item(&self, item_id: i64) -> Result<Option<Item>, DatabaseError> {
        let shown = Category::ALL.iter().find_map(|&category| {
            self.feed(category)
                .snapshot()
                .items
                .iter()
                .find(|item| item.id == item_id)
                .cloned()
        });
        match shown {
            Some(item) => Ok(Some(item)),
            None => self.db.find_cached_item(item_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticProbe;
    use crate::model::Page;
    use crate::remote::RemoteError;
    use async_trait::async_trait;

    struct OneItemSource;

    #[async_trait]
    impl RemoteSource for OneItemSource {
        async fn fetch_page(
            &self,
            category: Category,
            _query: Option<&str>,
            page: u32,
        ) -> Result<Page, RemoteError> {
            let id = match category {
                Category::Trending => 1,
                Category::NowPlaying => 2,
                Category::Popular => 3,
                Category::Search => 4,
            };
            Ok(Page {
                page_number: page,
                items: vec![Item {
                    id,
                    title: format!("{category}"),
                    overview: String::new(),
                    poster_ref: None,
                    release_date: None,
                    score: None,
                }],
                total_pages: 1,
                total_results: 1,
            })
        }
    }

    async fn app() -> App {
        let db = Database::open(":memory:").await.unwrap();
        App::from_parts(
            &Config::default(),
            db,
            Arc::new(OneItemSource),
            Arc::new(StaticProbe::new(true)),
            None,
        )
    }

    #[tokio::test]
    async fn test_load_home_fills_both_sections() {
        let app = app().await;
        app.load_home().await;

        assert_eq!(app.feed(Category::Trending).snapshot().items[0].id, 1);
        assert_eq!(app.feed(Category::NowPlaying).snapshot().items[0].id, 2);
        assert!(app.feed(Category::Popular).snapshot().items.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_bookmark_from_shown_item() {
        let app = app().await;
        app.load_home().await;

        let item = app.find_item(2).await.unwrap().unwrap();
        assert!(app.toggle_bookmark(&item).await.unwrap());
        assert!(app.is_bookmarked(2).await.unwrap());
        assert_eq!(app.bookmarks().await.unwrap().len(), 1);

        assert!(!app.toggle_bookmark(&item).await.unwrap());
        assert!(app.bookmarks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_item_falls_back_to_cache() {
        let app = app().await;
        app.feed(Category::Popular).load().await;
        app.feed(Category::Popular).reset().await;

        let item = app.find_item(3).await.unwrap();
        assert_eq!(item.map(|i| i.id), Some(3));
        assert!(app.find_item(99).await.unwrap().is_none());
    }
}

use chrono::Utc;

use super::schema::Database;
use super::types::{Bookmark, BookmarkRow, DatabaseError};
use crate::model::Item;

impl Database {
    // ========================================================================
    // Bookmark Operations
    // ========================================================================

    /// Bookmark an item.
    ///
    /// Bookmarking an item that is already bookmarked refreshes its fields and
    /// moves it to the top of [`list_bookmarks`](Self::list_bookmarks).
    pub async fn add_bookmark(&self, item: &Item) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO bookmarks
                (item_id, title, overview, poster_ref, release_date, score, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(item.id)
        .bind(&item.title)
        .bind(&item.overview)
        .bind(&item.poster_ref)
        .bind(&item.release_date)
        .bind(item.score)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Remove a bookmark. Returns `true` if one existed.
    pub async fn remove_bookmark(&self, item_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE item_id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_bookmarked(&self, item_id: i64) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM bookmarks WHERE item_id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// All bookmarks, most recently added first.
    pub async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, DatabaseError> {
        let rows = sqlx::query_as::<_, BookmarkRow>(
            r#"
            SELECT item_id, title, overview, poster_ref, release_date, score, created_at
            FROM bookmarks
            ORDER BY created_at DESC, seq DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BookmarkRow::into_bookmark).collect())
    }

    /// Flip the bookmark state of `item`. Returns the new state.
    pub async fn toggle_bookmark(&self, item: &Item) -> Result<bool, DatabaseError> {
        if self.remove_bookmark(item.id).await? {
            tracing::debug!(item_id = item.id, "Bookmark removed");
            Ok(false)
        } else {
            self.add_bookmark(item).await?;
            tracing::debug!(item_id = item.id, "Bookmark added");
            Ok(true)
        }
    }
}

use chrono::{DateTime, Duration, Utc};

use super::schema::Database;
use super::types::{DatabaseError, ItemRow};
use crate::model::Item;

/// Cached listings older than this are not served.
pub const DEFAULT_CATEGORY_TTL_HOURS: i64 = 24;

impl Database {
    // ========================================================================
    // Category Record Operations
    // ========================================================================

    /// Replace everything stored under `category` with `items`.
    ///
    /// The delete, the inserts, and the `last_updated` stamp commit in one
    /// transaction, so a reader sees either the old set or the new one. Other
    /// categories are never touched. Items keep the order they are given in.
    pub async fn replace_category(
        &self,
        category: &str,
        items: &[Item],
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM category_items WHERE category = ?")
            .bind(category)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO category_records (category, last_updated)
            VALUES (?, ?)
            ON CONFLICT(category) DO UPDATE SET last_updated = excluded.last_updated
        "#,
        )
        .bind(category)
        .bind(now.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO category_items
                    (category, position, item_id, title, overview, poster_ref, release_date, score)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            )
            .bind(category)
            .bind(position as i64)
            .bind(item.id)
            .bind(&item.title)
            .bind(&item.overview)
            .bind(&item.poster_ref)
            .bind(&item.release_date)
            .bind(item.score)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(category = %category, items = items.len(), "Replaced cached category");
        Ok(())
    }

    /// Read the cached items for `category`.
    ///
    /// Never fails: a missing record or a storage error both yield an empty
    /// list, with the error logged.
    pub async fn read_category(&self, category: &str) -> Vec<Item> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT item_id, title, overview, poster_ref, release_date, score
            FROM category_items
            WHERE category = ?
            ORDER BY position
        "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => rows.into_iter().map(ItemRow::into_item).collect(),
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "Failed to read cached category");
                Vec::new()
            }
        }
    }

    /// When `category` was last written, if it has a record.
    pub async fn category_last_updated(
        &self,
        category: &str,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT last_updated FROM category_records WHERE category = ?")
                .bind(category)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(millis,)| DateTime::from_timestamp_millis(millis)))
    }

    /// True iff `category` has a record written less than `ttl` before `now`.
    ///
    /// Storage errors count as stale.
    pub async fn is_fresh(&self, category: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.category_last_updated(category).await {
            Ok(Some(last_updated)) => now.signed_duration_since(last_updated) < ttl,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(category = %category, error = %e, "Failed to check cache freshness");
                false
            }
        }
    }

    /// Delete every category record (and its items) older than `ttl`.
    ///
    /// Returns the number of records evicted.
    pub async fn evict_stale_categories(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<u64, DatabaseError> {
        let cutoff = (now - ttl).timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM category_items WHERE category IN (
                SELECT category FROM category_records WHERE last_updated <= ?
            )
        "#,
        )
        .bind(cutoff)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM category_records WHERE last_updated <= ?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    /// Look up an item by id across all cached categories.
    pub async fn find_cached_item(&self, item_id: i64) -> Result<Option<Item>, DatabaseError> {
        let row = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT ci.item_id, ci.title, ci.overview, ci.poster_ref, ci.release_date, ci.score
            FROM category_items ci
            JOIN category_records cr ON cr.category = ci.category
            WHERE ci.item_id = ?
            ORDER BY cr.last_updated DESC
            LIMIT 1
        "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ItemRow::into_item))
    }
}

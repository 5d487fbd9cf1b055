use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::Item;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of reelfeed appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as
/// one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Row Types
// ============================================================================

/// Internal row type for cached and bookmarked items (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ItemRow {
    pub item_id: i64,
    pub title: String,
    pub overview: String,
    pub poster_ref: Option<String>,
    pub release_date: Option<String>,
    pub score: Option<f64>,
}

impl ItemRow {
    pub(crate) fn into_item(self) -> Item {
        Item {
            id: self.item_id,
            title: self.title,
            overview: self.overview,
            poster_ref: self.poster_ref,
            release_date: self.release_date,
            score: self.score,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct BookmarkRow {
    #[sqlx(flatten)]
    pub item: ItemRow,
    pub created_at: i64,
}

// ============================================================================
// Data Structures
// ============================================================================

/// A bookmarked item with the time it was added.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub item: Item,
    pub created_at: DateTime<Utc>,
}

impl BookmarkRow {
    pub(crate) fn into_bookmark(self) -> Bookmark {
        Bookmark {
            item: self.item.into_item(),
            created_at: DateTime::from_timestamp_millis(self.created_at).unwrap_or_default(),
        }
    }
}

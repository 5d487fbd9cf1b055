//! Core listing types shared by the remote source, the store, and the feeds.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Category
// ============================================================================

/// A named listing bucket with its own cache record and pagination cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Trending,
    NowPlaying,
    Popular,
    Search,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Trending,
        Category::NowPlaying,
        Category::Popular,
        Category::Search,
    ];

    /// Stable key used for the persisted category record.
    pub fn cache_key(self) -> &'static str {
        match self {
            Category::Trending => "trending",
            Category::NowPlaying => "nowPlaying",
            Category::Popular => "popular",
            Category::Search => "search",
        }
    }

    /// Endpoint path relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Category::Trending => "trending/movie/day",
            Category::NowPlaying => "movie/now_playing",
            Category::Popular => "movie/popular",
            Category::Search => "search/movie",
        }
    }

    /// Human label used in user-facing error text.
    pub fn label(self) -> &'static str {
        match self {
            Category::Trending => "trending movies",
            Category::NowPlaying => "now playing movies",
            Category::Popular => "popular movies",
            Category::Search => "search results",
        }
    }

    /// Search results depend on the query, so they never get a cache record.
    pub fn is_cached(self) -> bool {
        !matches!(self, Category::Search)
    }

    pub fn requires_query(self) -> bool {
        matches!(self, Category::Search)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

// ============================================================================
// Item and Page
// ============================================================================

/// A single movie in a listing.
///
/// `id` is the identity used for deduplication; two items with the same id are
/// treated as the same movie even if their other fields differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub poster_ref: Option<String>,
    pub release_date: Option<String>,
    pub score: Option<f64>,
}

impl Item {
    /// Full poster URL for this item, if it has a poster.
    pub fn poster_url(&self, image_base: &str) -> Option<String> {
        self.poster_ref
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}/{}", image_base.trim_end_matches('/'), p.trim_start_matches('/')))
    }
}

/// One page of a listing as returned by the remote source.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_number: u32,
    pub items: Vec<Item>,
    pub total_pages: u32,
    pub total_results: u64,
}

impl Page {
    pub fn has_more(&self) -> bool {
        self.page_number < self.total_pages
    }
}

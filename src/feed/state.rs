use std::sync::Arc;
use thiserror::Error;

use crate::model::{Category, Item};

/// Where a feed is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedPhase {
    /// Nothing requested yet, or the feed was reset
    #[default]
    Idle,
    Loading,
    /// Showing data from a live fetch (or cached data after a failed fetch)
    Ready,
    /// No connectivity; showing fresh cached data
    Offline,
    /// Nothing to show
    Failed,
}

/// User-facing feed errors.
///
/// Remote and store failures never reach the presentation layer directly;
/// they are folded into one of these, whose `Display` is the text to show.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("No internet connection and no cached {} available.", .0.label())]
    NoConnectivityNoCache(Category),

    #[error("No internet connection. Cannot load more {}.", .0.label())]
    NoConnectivityCantPage(Category),

    #[error("Failed to load {} and no cached data is available: {reason}", .category.label())]
    FetchFailedNoCache { category: Category, reason: String },

    #[error("Request timed out. Showing cached {}.", .0.label())]
    TimedOut(Category),

    #[error("Failed to load {}: {reason}. Showing cached data.", .category.label())]
    FetchFailed { category: Category, reason: String },

    #[error("Request timed out while loading more {}.", .0.label())]
    LoadMoreTimedOut(Category),

    #[error("Failed to load more {}: {reason}", .category.label())]
    LoadMoreFailed { category: Category, reason: String },
}

/// Immutable snapshot of a feed, published on every change.
///
/// `items` is an `Arc` so snapshots are cheap to clone for every subscriber.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub category: Category,
    pub phase: FeedPhase,
    pub items: Arc<Vec<Item>>,
    /// Last page merged into `items` (0 before the first page)
    pub current_page: u32,
    pub can_load_more: bool,
    /// A `load_more` is in flight
    pub is_fetching: bool,
    pub is_loading: bool,
    pub is_offline: bool,
    pub last_error: Option<FeedError>,
    /// Active search query, for the search feed
    pub query: Option<String>,
}

impl FeedState {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            phase: FeedPhase::Idle,
            items: Arc::new(Vec::new()),
            current_page: 0,
            can_load_more: true,
            is_fetching: false,
            is_loading: false,
            is_offline: false,
            last_error: None,
            query: None,
        }
    }

    pub fn error_text(&self) -> Option<String> {
        self.last_error.as_ref().map(ToString::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle_and_pageable() {
        let state = FeedState::new(Category::Popular);
        assert_eq!(state.phase, FeedPhase::Idle);
        assert!(state.items.is_empty());
        assert!(state.can_load_more);
        assert!(state.error_text().is_none());
    }

    #[test]
    fn test_timeout_text_mentions_cache() {
        let text = FeedError::TimedOut(Category::Trending).to_string();
        assert_eq!(text, "Request timed out. Showing cached trending movies.");
    }

    #[test]
    fn test_offline_texts() {
        assert_eq!(
            FeedError::NoConnectivityNoCache(Category::Popular).to_string(),
            "No internet connection and no cached popular movies available."
        );
        assert_eq!(
            FeedError::NoConnectivityCantPage(Category::NowPlaying).to_string(),
            "No internet connection. Cannot load more now playing movies."
        );
    }

    #[test]
    fn test_failure_text_includes_reason() {
        let err = FeedError::FetchFailedNoCache {
            category: Category::Search,
            reason: "Server error: status 500".to_string(),
        };
        assert!(err.to_string().contains("status 500"));
        assert!(err.to_string().contains("search results"));
    }
}

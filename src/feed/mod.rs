//! Per-category listing feeds.
//!
//! A [`CategoryFeed`] owns one category's pagination cursor and decides, on
//! every load, whether to hit the network or serve the cache:
//!
//! - **Online**: fetch, dedup, publish, then write through to the store
//! - **Offline or failed**: serve the cached record if it is within the TTL
//! - **Paging**: `load_more` merges the next page into what is shown
//!
//! State leaves a feed only as [`FeedState`] snapshots on a `watch` channel.
//! [`SearchFeed`] debounces query input in front of the search feed, and
//! [`ImagePrefetcher`] warms poster bytes for whatever gets published.
//!
//! # Example
//!
//! ```ignore
//! let feed = Arc::new(CategoryFeed::new(Category::Popular, remote, db, probe));
//! let mut rx = feed.subscribe();
//!
//! feed.load().await;
//! feed.load_more().await;
//! println!("{} movies", rx.borrow_and_update().items.len());
//! ```

mod category;
mod prefetch;
mod search;
mod state;

pub use category::CategoryFeed;
pub use prefetch::ImagePrefetcher;
pub use search::{SearchFeed, DEFAULT_DEBOUNCE};
pub use state::{FeedError, FeedPhase, FeedState};

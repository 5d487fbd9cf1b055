//! Offline-tolerant movie listing engine.
//!
//! Fetches paginated listings from a remote API, merges pages without
//! duplicates, caches each category in SQLite with a TTL, and publishes feed
//! state snapshots to whatever presents them.

pub mod app;
pub mod config;
pub mod connectivity;
pub mod dedup;
pub mod feed;
pub mod model;
pub mod remote;
pub mod storage;

use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::prefetch::ImagePrefetcher;
use super::state::{FeedError, FeedPhase, FeedState};
use crate::connectivity::ConnectivityProbe;
use crate::dedup;
use crate::model::{Category, Item, Page};
use crate::remote::{RemoteError, RemoteSource};
use crate::storage::{Database, DEFAULT_CATEGORY_TTL_HOURS};

/// Pagination cursor plus the token of the operation that currently owns it.
///
/// Every `load` bumps `generation` and swaps in a fresh token, cancelling the
/// old one. Work started under an older generation never publishes.
struct Cursor {
    page: u32,
    can_load_more: bool,
    query: Option<String>,
    generation: u64,
    cancel: CancellationToken,
}

impl Cursor {
    fn new() -> Self {
        Self {
            page: 0,
            can_load_more: true,
            query: None,
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel whatever is in flight and start a new generation.
    fn supersede(&mut self) -> (u64, CancellationToken) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.generation = self.generation.wrapping_add(1);
        (self.generation, self.cancel.clone())
    }
}

/// One listing category: fetches pages, merges them, caches them, and
/// publishes [`FeedState`] snapshots.
///
/// All operations take `&self`; share a feed as `Arc<CategoryFeed>` and call
/// `load`/`load_more` from as many tasks as needed. Subscribers receive the
/// latest snapshot through [`subscribe`](Self::subscribe).
pub struct CategoryFeed {
    category: Category,
    remote: Arc<dyn RemoteSource>,
    store: Database,
    probe: Arc<dyn ConnectivityProbe>,
    prefetcher: Option<ImagePrefetcher>,
    ttl: Duration,
    cursor: Mutex<Cursor>,
    fetching: AtomicBool,
    write_lock: Mutex<()>,
    state_tx: watch::Sender<FeedState>,
}

/// Clears the in-flight flag when a `load_more` exits by any path.
///
/// If a `load` superseded the call, the flag already belongs to the new
/// generation and is left alone.
struct FetchGuard<'a> {
    feed: &'a CategoryFeed,
    token: CancellationToken,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            self.feed.fetching.store(false, Ordering::Release);
            self.feed.state_tx.send_modify(|s| s.is_fetching = false);
        }
    }
}

impl CategoryFeed {
    pub fn new(
        category: Category,
        remote: Arc<dyn RemoteSource>,
        store: Database,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        let (state_tx, _) = watch::channel(FeedState::new(category));
        Self {
            category,
            remote,
            store,
            probe,
            prefetcher: None,
            ttl: Duration::hours(DEFAULT_CATEGORY_TTL_HOURS),
            cursor: Mutex::new(Cursor::new()),
            fetching: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            state_tx,
        }
    }

    /// How old cached data may be and still be served.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Prefetch posters for every batch of items that gets published.
    pub fn with_prefetcher(mut self, prefetcher: ImagePrefetcher) -> Self {
        self.prefetcher = Some(prefetcher);
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> FeedState {
        self.state_tx.borrow().clone()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Load the first page, replacing whatever the feed shows.
    ///
    /// Online: fetch page 1, publish, then write through to the store. Offline
    /// or on a failed fetch: serve the cached record if it is fresh.
    /// Supersedes any `load` or `load_more` still in flight on this feed.
    pub async fn load(&self) {
        self.start_load(None).await;
    }

    /// Set the search query and load its first page.
    pub async fn search(&self, query: &str) {
        self.start_load(Some(query.trim().to_string())).await;
    }

    async fn start_load(&self, query: Option<String>) {
        let (generation, token, query) = {
            let mut cursor = self.cursor.lock().await;
            let (generation, token) = cursor.supersede();
            if query.is_some() {
                cursor.query = query;
            }
            cursor.page = 0;
            cursor.can_load_more = true;
            self.fetching.store(false, Ordering::Release);

            let query = cursor.query.clone();
            self.state_tx.send_modify(|s| {
                s.phase = FeedPhase::Loading;
                s.items = Arc::new(Vec::new());
                s.current_page = 0;
                s.can_load_more = true;
                s.is_fetching = false;
                s.is_loading = true;
                s.is_offline = false;
                s.last_error = None;
                s.query = query.clone();
            });
            (generation, token, query)
        };

        tracing::debug!(category = %self.category, generation, "Loading feed");

        if !self.probe.is_online().await {
            tracing::info!(category = %self.category, "Offline, serving cached listing");
            self.finish_from_cache(generation, None).await;
            return;
        }

        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(category = %self.category, generation, "Load superseded");
                return;
            }
            result = self.remote.fetch_page(self.category, query.as_deref(), 1) => result,
        };

        match result {
            Ok(page) => self.finish_first_page(generation, page).await,
            Err(e) => {
                tracing::warn!(category = %self.category, error = %e, "Fetch failed, falling back to cache");
                self.finish_from_cache(generation, Some(e)).await;
            }
        }
    }

    async fn finish_first_page(&self, generation: u64, page: Page) {
        let can_load_more = page.has_more();
        let total_pages = page.total_pages;
        let items = dedup::dedup(page.items);

        {
            let mut cursor = self.cursor.lock().await;
            if cursor.generation != generation {
                return;
            }
            cursor.page = 1;
            cursor.can_load_more = can_load_more;

            let shown = items.clone();
            self.state_tx.send_modify(|s| {
                s.phase = FeedPhase::Ready;
                s.items = Arc::new(shown);
                s.current_page = 1;
                s.can_load_more = can_load_more;
                s.is_loading = false;
                s.is_offline = false;
                s.last_error = None;
            });
        }

        tracing::info!(
            category = %self.category,
            items = items.len(),
            total_pages,
            "Feed loaded"
        );

        self.write_through(generation, &items).await;
        self.spawn_prefetch(items);
    }

    /// Publish the cached record (if fresh) after going offline or failing.
    ///
    /// `failure` is `None` when the probe reported no connectivity.
    async fn finish_from_cache(&self, generation: u64, failure: Option<RemoteError>) {
        let cached = self.read_fresh_cache().await;
        let offline = failure.is_none();
        let category = self.category;

        let (phase, error) = match (&failure, cached.is_empty()) {
            (None, false) => (FeedPhase::Offline, None),
            (None, true) => (
                FeedPhase::Failed,
                Some(FeedError::NoConnectivityNoCache(category)),
            ),
            (Some(e), true) => (
                FeedPhase::Failed,
                Some(FeedError::FetchFailedNoCache {
                    category,
                    reason: e.to_string(),
                }),
            ),
            (Some(e), false) if e.is_timeout() => {
                (FeedPhase::Ready, Some(FeedError::TimedOut(category)))
            }
            (Some(e), false) => (
                FeedPhase::Ready,
                Some(FeedError::FetchFailed {
                    category,
                    reason: e.to_string(),
                }),
            ),
        };

        {
            let mut cursor = self.cursor.lock().await;
            if cursor.generation != generation {
                return;
            }
            // No live page was merged. Paging over a cached listing restarts
            // at page 1; a failed load has nothing to page.
            let can_load_more = !cached.is_empty();
            cursor.page = 0;
            cursor.can_load_more = can_load_more;

            let shown = cached.clone();
            self.state_tx.send_modify(|s| {
                s.phase = phase;
                s.items = Arc::new(shown);
                s.current_page = 0;
                s.can_load_more = can_load_more;
                s.is_loading = false;
                s.is_offline = offline;
                s.last_error = error;
            });
        }

        if !cached.is_empty() {
            tracing::debug!(category = %self.category, items = cached.len(), "Serving cached listing");
            self.spawn_prefetch(cached);
        }
    }

    async fn read_fresh_cache(&self) -> Vec<Item> {
        if !self.category.is_cached() {
            return Vec::new();
        }
        let key = self.category.cache_key();
        if !self.store.is_fresh(key, Utc::now(), self.ttl).await {
            return Vec::new();
        }
        dedup::dedup(self.store.read_category(key).await)
    }

    // ========================================================================
    // Load More
    // ========================================================================

    /// Fetch the next page and append its new items.
    ///
    /// No-op while another `load_more` is in flight or once the last page has
    /// been merged. Offline, it only surfaces an error; the items shown are
    /// never dropped by a failed page.
    pub async fn load_more(&self) {
        let (generation, token, next_page, query) = {
            let cursor = self.cursor.lock().await;
            if !cursor.can_load_more {
                tracing::trace!(category = %self.category, "No more pages");
                return;
            }
            if self.state_tx.borrow().phase == FeedPhase::Loading {
                return;
            }
            if self.fetching.swap(true, Ordering::AcqRel) {
                tracing::debug!(category = %self.category, "Load more already in flight");
                return;
            }
            (
                cursor.generation,
                cursor.cancel.clone(),
                cursor.page.saturating_add(1),
                cursor.query.clone(),
            )
        };
        let _guard = FetchGuard {
            feed: self,
            token: token.clone(),
        };
        self.state_tx.send_modify(|s| s.is_fetching = true);

        if !self.probe.is_online().await {
            self.publish_error(generation, FeedError::NoConnectivityCantPage(self.category))
                .await;
            return;
        }

        tracing::debug!(category = %self.category, page = next_page, "Loading more");

        let result = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!(category = %self.category, page = next_page, "Load more superseded");
                return;
            }
            result = self.remote.fetch_page(self.category, query.as_deref(), next_page) => result,
        };

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    category = %self.category,
                    page = next_page,
                    error = %e,
                    "Load more failed"
                );
                let error = if e.is_timeout() {
                    FeedError::LoadMoreTimedOut(self.category)
                } else {
                    FeedError::LoadMoreFailed {
                        category: self.category,
                        reason: e.to_string(),
                    }
                };
                self.publish_error(generation, error).await;
                return;
            }
        };

        let can_load_more = page.has_more();
        let new_items = page.items;

        let merged = {
            let mut cursor = self.cursor.lock().await;
            if cursor.generation != generation {
                return;
            }
            cursor.page = next_page;
            cursor.can_load_more = can_load_more;

            let existing = self.state_tx.borrow().items.as_ref().clone();
            let merged = dedup::merge([existing, new_items.clone()]);
            let shown = merged.clone();
            self.state_tx.send_modify(|s| {
                s.phase = FeedPhase::Ready;
                s.items = Arc::new(shown);
                s.current_page = next_page;
                s.can_load_more = can_load_more;
                s.is_offline = false;
                s.last_error = None;
            });
            merged
        };

        tracing::info!(
            category = %self.category,
            page = next_page,
            total = merged.len(),
            "Merged next page"
        );

        // The store replaces whole categories, so persist everything shown
        self.write_through(generation, &merged).await;
        self.spawn_prefetch(new_items);
    }

    // ========================================================================
    // Reset / Cancel
    // ========================================================================

    /// Cancel in-flight work and return to a blank idle state.
    pub async fn reset(&self) {
        let mut cursor = self.cursor.lock().await;
        cursor.supersede();
        cursor.page = 0;
        cursor.can_load_more = true;
        cursor.query = None;
        self.fetching.store(false, Ordering::Release);
        self.state_tx.send_replace(FeedState::new(self.category));
    }

    /// Cancel in-flight work but keep what is shown.
    ///
    /// An interrupted first-page load leaves the feed `Idle` with nothing to
    /// page from. An interrupted `load_more` only clears `is_fetching`.
    pub async fn cancel(&self) {
        let mut cursor = self.cursor.lock().await;
        cursor.supersede();
        self.fetching.store(false, Ordering::Release);

        let was_loading = self.state_tx.borrow().phase == FeedPhase::Loading;
        if was_loading {
            cursor.page = 0;
            cursor.can_load_more = true;
            tracing::debug!(category = %self.category, "Cancelled load");
        }
        self.state_tx.send_modify(|s| {
            s.is_fetching = false;
            if was_loading {
                s.phase = FeedPhase::Idle;
                s.is_loading = false;
                s.current_page = 0;
                s.can_load_more = true;
            }
        });
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn publish_error(&self, generation: u64, error: FeedError) {
        let cursor = self.cursor.lock().await;
        if cursor.generation == generation {
            self.state_tx.send_modify(|s| s.last_error = Some(error));
        }
    }

    /// Persist `items` as the category's record.
    ///
    /// Runs after publishing. Same-feed writes queue on the write lock, and a
    /// write whose generation was superseded while waiting is dropped so it
    /// cannot clobber the newer record.
    async fn write_through(&self, generation: u64, items: &[Item]) {
        if !self.category.is_cached() {
            return;
        }
        let _write = self.write_lock.lock().await;
        if self.cursor.lock().await.generation != generation {
            tracing::debug!(category = %self.category, "Skipping superseded write-through");
            return;
        }

        if let Err(e) = self
            .store
            .replace_category(self.category.cache_key(), items, Utc::now())
            .await
        {
            tracing::warn!(category = %self.category, error = %e, "Failed to cache listing");
        }
    }

    fn spawn_prefetch(&self, items: Vec<Item>) {
        if let Some(prefetcher) = self.prefetcher.clone() {
            tokio::spawn(async move {
                prefetcher.prefetch(&items).await;
            });
        }
    }
}

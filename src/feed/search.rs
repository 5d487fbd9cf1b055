use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::category::CategoryFeed;
use super::state::FeedState;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

struct PendingSearch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Debounced query front-end over the search feed.
///
/// Each keystroke cancels the previous pending task and schedules a new one
/// after the debounce window. An empty query clears the results and loads the
/// popular feed instead.
pub struct SearchFeed {
    results: Arc<CategoryFeed>,
    popular: Arc<CategoryFeed>,
    debounce: Duration,
    pending: Mutex<Option<PendingSearch>>,
}

impl SearchFeed {
    pub fn new(results: Arc<CategoryFeed>, popular: Arc<CategoryFeed>) -> Self {
        Self {
            results,
            popular,
            debounce: DEFAULT_DEBOUNCE,
            pending: Mutex::new(None),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn results(&self) -> &Arc<CategoryFeed> {
        &self.results
    }

    pub fn popular(&self) -> &Arc<CategoryFeed> {
        &self.popular
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.results.subscribe()
    }

    /// Record a keystroke. The query runs once input has been quiet for the
    /// debounce window.
    ///
    /// Only the debounce wait is abandoned when a newer keystroke arrives. A
    /// search already in flight is cancelled through the results feed, and a
    /// popular-feed fallback always runs to completion.
    pub async fn set_query(&self, query: &str) {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let results = Arc::clone(&self.results);
        let popular = Arc::clone(&self.popular);
        let debounce = self.debounce;
        let query = query.trim().to_string();

        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.take() {
            previous.cancel.cancel();
            tracing::trace!("Superseded pending search");
        }
        self.results.cancel().await;

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = task_cancel.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }
            if task_cancel.is_cancelled() {
                return;
            }
            run_query(&results, &popular, &query).await;
        });

        *pending = Some(PendingSearch { cancel, handle });
    }

    /// Run `query` immediately, cancelling any pending debounced search.
    pub async fn search_now(&self, query: &str) {
        if let Some(previous) = self.pending.lock().await.take() {
            previous.cancel.cancel();
        }
        run_query(&self.results, &self.popular, query.trim()).await;
    }

    /// Wait for the pending search (if any) to finish.
    pub async fn settle(&self) {
        let pending = self.pending.lock().await.take();
        if let Some(pending) = pending {
            if let Err(e) = pending.handle.await {
                tracing::warn!(error = %e, "Search task failed");
            }
        }
    }

    pub async fn load_more(&self) {
        self.results.load_more().await;
    }
}

impl Drop for SearchFeed {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.get_mut().take() {
            pending.cancel.cancel();
        }
    }
}

async fn run_query(results: &CategoryFeed, popular: &CategoryFeed, query: &str) {
    if query.is_empty() {
        tracing::debug!("Empty query, showing popular movies");
        results.reset().await;
        popular.load().await;
    } else {
        tracing::debug!(query = %query, "Searching");
        results.search(query).await;
    }
}

//! Poster prefetching with a bounded download window.
//!
//! Downloaded bytes go into an in-memory LRU cache keyed by URL. Nothing here
//! decodes images; the presentation layer reads raw bytes via [`ImagePrefetcher::cached`].

use futures::stream::{self, StreamExt};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

use crate::model::Item;
use crate::remote::{read_limited_bytes, RemoteError};

pub const DEFAULT_MAX_CONCURRENT: usize = 5;
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

const MAX_IMAGE_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Downloads posters for listed items ahead of display.
///
/// Clones share the same cache and the same download limit.
#[derive(Clone)]
pub struct ImagePrefetcher {
    client: reqwest::Client,
    image_base_url: String,
    max_concurrent: usize,
    timeout: Duration,
    permits: Arc<Semaphore>,
    cache: Arc<Mutex<LruCache<String, Arc<[u8]>>>>,
}

impl ImagePrefetcher {
    pub fn new(client: reqwest::Client, image_base_url: impl Into<String>) -> Self {
        Self::with_limits(
            client,
            image_base_url,
            DEFAULT_MAX_CONCURRENT,
            DEFAULT_CACHE_CAPACITY,
        )
    }

    /// Zero limits are raised to 1.
    pub fn with_limits(
        client: reqwest::Client,
        image_base_url: impl Into<String>,
        max_concurrent: usize,
        cache_capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let max_concurrent = max_concurrent.max(1);
        Self {
            client,
            image_base_url: image_base_url.into(),
            max_concurrent,
            timeout: Duration::from_secs(20),
            permits: Arc::new(Semaphore::new(max_concurrent)),
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Download posters for `items` that are not cached yet.
    ///
    /// At most `max_concurrent` downloads run at once across this prefetcher
    /// and its clones. Returns the number of images stored.
    pub async fn prefetch(&self, items: &[Item]) -> usize {
        let mut urls = Vec::new();
        for url in items
            .iter()
            .filter_map(|item| item.poster_url(&self.image_base_url))
        {
            if !urls.contains(&url) && !self.is_cached(&url).await {
                urls.push(url);
            }
        }

        if urls.is_empty() {
            return 0;
        }

        let total = urls.len();
        let stored: usize = stream::iter(urls)
            .map(|url| async move {
                match self.download(&url).await {
                    Some(bytes) => {
                        self.cache.lock().await.put(url, bytes);
                        1
                    }
                    None => 0,
                }
            })
            .buffer_unordered(self.max_concurrent)
            .fold(0, |acc, n| async move { acc + n })
            .await;

        tracing::debug!(requested = total, stored, "Poster prefetch finished");
        stored
    }

    /// Cached bytes for a poster URL.
    pub async fn cached(&self, url: &str) -> Option<Arc<[u8]>> {
        self.cache.lock().await.get(url).cloned()
    }

    async fn is_cached(&self, url: &str) -> bool {
        self.cache.lock().await.contains(url)
    }

    async fn download(&self, url: &str) -> Option<Arc<[u8]>> {
        let _permit = self.permits.acquire().await.ok()?;

        match tokio::time::timeout(self.timeout, self.fetch(url)).await {
            Ok(Ok(bytes)) => Some(Arc::from(bytes)),
            Ok(Err(e)) => {
                tracing::debug!(url = %url, error = %e, "Poster download failed");
                None
            }
            Err(_) => {
                tracing::debug!(url = %url, "Poster download timed out");
                None
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::ServerError(response.status().as_u16()));
        }
        read_limited_bytes(response, MAX_IMAGE_SIZE).await
    }
}

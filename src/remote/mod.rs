//! Remote listing source.
//!
//! [`RemoteSource`] is the seam between the feeds and the network. The HTTP
//! implementation is [`TmdbClient`]; tests substitute their own doubles.
//!
//! A source performs exactly one request per call. Retrying is left to the
//! caller, which in this crate means falling back to the cache.

mod client;
mod dto;

pub use client::TmdbClient;
pub(crate) use client::read_limited_bytes;

use crate::model::{Category, Page};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("Server error: status {0}")]
    ServerError(u16),
    /// Body was not the expected listing JSON
    #[error("Could not decode response: {0}")]
    Decode(String),
    /// Search was requested without a query
    #[error("Search requires a non-empty query")]
    MissingQuery,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// True for both our own deadline and reqwest's.
    pub fn is_timeout(&self) -> bool {
        match self {
            RemoteError::Timeout => true,
            RemoteError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Paginated listing API.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch one page of `category`.
    ///
    /// `query` must be a non-empty string for [`Category::Search`] and is
    /// ignored for every other category. Pages are 1-based.
    async fn fetch_page(
        &self,
        category: Category,
        query: Option<&str>,
        page: u32,
    ) -> Result<Page, RemoteError>;
}

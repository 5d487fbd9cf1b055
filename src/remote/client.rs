use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use super::dto::PageDto;
use super::{RemoteError, RemoteSource};
use crate::model::{Category, Page};

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// HTTP listing source for the TMDB v3 API.
pub struct TmdbClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    language: String,
    timeout: Duration,
}

impl TmdbClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: SecretString,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
            language: language.into(),
            timeout,
        }
    }

    /// Build the request URL for one page of `category`.
    fn page_url(
        &self,
        category: Category,
        query: Option<&str>,
        page: u32,
    ) -> Result<Url, RemoteError> {
        let raw = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            category.path()
        );
        let mut url = Url::parse(&raw).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("language", &self.language);
            if category.requires_query() {
                let query = query
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .ok_or(RemoteError::MissingQuery)?;
                pairs.append_pair("query", query);
            }
            pairs.append_pair("page", &page.max(1).to_string());
        }

        Ok(url)
    }
}

#[async_trait]
impl RemoteSource for TmdbClient {
    async fn fetch_page(
        &self,
        category: Category,
        query: Option<&str>,
        page: u32,
    ) -> Result<Page, RemoteError> {
        let url = self.page_url(category, query, page)?;
        tracing::debug!(category = %category, page, "Fetching listing page");

        let request = self
            .client
            .get(url)
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .header("Accept", "application/json");

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RemoteError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteError::Timeout
                } else {
                    RemoteError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            tracing::warn!(
                category = %category,
                page,
                status = %response.status(),
                "Listing request rejected"
            );
            return Err(RemoteError::ServerError(response.status().as_u16()));
        }

        let bytes = tokio::time::timeout(
            self.timeout,
            read_limited_bytes(response, MAX_RESPONSE_SIZE),
        )
        .await
        .map_err(|_| RemoteError::Timeout)??;

        let dto: PageDto =
            serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))?;
        let page = Page::from(dto);

        tracing::debug!(
            category = %category,
            page = page.page_number,
            total_pages = page.total_pages,
            items = page.items.len(),
            "Fetched listing page"
        );
        Ok(page)
    }
}

/// Read a body, failing once it grows past `limit` bytes.
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, RemoteError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(RemoteError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(RemoteError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

//! Page fetcher wrapping reqwest.
//!
//! One GET per call, no retry loop and no caching; the caller's schedule is
//! the retry mechanism.

use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Browser-like client signature; the upstream serves a reduced page to
/// unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                              AppleWebKit/537.36 (KHTML, like Gecko) \
                              Chrome/131.0.0.0 Safari/537.36";

/// Retrieves raw markup for a URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Return the response body on HTTP 200, a [`FetchError`] otherwise.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP fetcher for the upstream price page.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Create a fetcher with the given per-request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(url, "fetching upstream page");

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .header(reqwest::header::ACCEPT_LANGUAGE, "ja,en;q=0.8")
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = resp.status().as_u16();
        if status != 200 {
            tracing::warn!(url, status, "upstream returned non-200");
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.text().await.map_err(|e| classify(url, e))?;
        tracing::debug!(url, bytes = body.len(), "fetched upstream page");
        Ok(body)
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: e,
        }
    }
}

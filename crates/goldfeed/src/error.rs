//! Error types for the refresh pipeline.

use crate::types::SeriesKind;

/// Failure of the outbound page request.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("upstream returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    /// HTTP status code, when the upstream answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Timeout { .. } => None,
        }
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Network failures, timeouts, 5xx and 429 are retryable; any other
    /// status is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// All errors that can end a refresh or a cache read.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no extraction strategy produced {0} data")]
    ExtractionEmpty(SeriesKind),

    #[error("no {0} observations survived normalization")]
    NormalizationEmpty(SeriesKind),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid freshness record for {kind}: {reason}")]
    InvalidRecord { kind: SeriesKind, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl FeedError {
    /// Whether the error came from talking to the upstream page.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_) | Self::ExtractionEmpty(_) | Self::NormalizationEmpty(_)
        )
    }
}

pub type FeedResult<T> = std::result::Result<T, FeedError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            url: "https://example.com".to_string(),
            status: code,
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(status(503).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(403).is_retryable());
        assert_eq!(status(404).status_code(), Some(404));
    }

    #[test]
    fn test_timeout_is_retryable_without_status() {
        let e = FetchError::Timeout {
            url: "https://example.com".to_string(),
        };
        assert!(e.is_retryable());
        assert_eq!(e.status_code(), None);
    }

    #[test]
    fn test_upstream_errors() {
        assert!(FeedError::ExtractionEmpty(SeriesKind::Daily).is_upstream());
        assert!(FeedError::from(status(502)).is_upstream());
        assert!(!FeedError::Config("bad".into()).is_upstream());
    }
}

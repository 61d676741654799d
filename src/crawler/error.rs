use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Error types for a crawl run.
///
/// Every variant is fatal to the run: it is propagated to the top level and
/// the stored cursor is left untouched so the next run retries the same window.
#[derive(Error, Debug)]
pub(crate) enum CrawlError {
    #[error("Request error for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("Invalid URL `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Result type for crawl operations
pub(crate) type CrawlResult<T> = Result<T, CrawlError>;

impl CrawlError {
    pub(crate) fn request(url: &str, source: reqwest::Error) -> Self {
        CrawlError::Request {
            url: url.to_string(),
            source,
        }
    }
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::CrawlConfig;
use crate::crawler::error::{CrawlError, CrawlResult};

/// Retrieves a listing page. The body is parsed by the extractor.
#[async_trait]
pub(crate) trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> CrawlResult<String>;
}

/// Builds the HTTP client shared by page fetching and image downloads.
pub(crate) fn build_client(config: &CrawlConfig) -> CrawlResult<Client> {
    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .gzip(true)
        .brotli(true)
        .deflate(true);

    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder
        .build()
        .map_err(|e| CrawlError::request("<client>", e))
}

/// Fetches listing pages over HTTP.
pub(crate) struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &str) -> CrawlResult<String> {
        debug!("Fetching listing page {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrawlError::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|e| CrawlError::request(url, e))
    }
}

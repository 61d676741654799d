//! In-memory stand-ins for the crawl collaborators, used by unit tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::crawler::cursor::CursorStore;
use crate::crawler::downloader::{DownloadOutcome, Downloader};
use crate::crawler::error::{CrawlError, CrawlResult};
use crate::crawler::fetcher::PageFetcher;

/// URL of the `n`th (1-based) fake listing page.
pub(crate) fn page_url(n: usize) -> String {
    format!("https://listing.test/new/?page={}", n)
}

/// Markup for one listing entry.
pub(crate) fn post(id: &str, url: &str, timestamp: i64, title: &str) -> String {
    format!(
        r#"<div class="thing" data-fullname="{id}" data-url="{url}" data-timestamp="{timestamp}"><a class="title" href="/c/{id}">{title}</a></div>"#
    )
}

/// Markup for a listing page holding `entries`, optionally linking onwards.
pub(crate) fn listing(entries: &[String], next: Option<&str>) -> String {
    let nav = next
        .map(|href| format!(r#"<div class="nav-buttons"><span class="next-button"><a href="{href}">next</a></span></div>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body><div id="siteTable">{}</div>{}</body></html>"#,
        entries.concat(),
        nav
    )
}

/// Client that talks to local test servers directly, ignoring proxy settings.
pub(crate) fn local_client() -> Client {
    Client::builder().no_proxy().build().unwrap()
}

/// Answers a single HTTP request on a loopback port with `status` and `body`.
///
/// Returns the server's base URL, e.g. `http://127.0.0.1:41234`.
pub(crate) async fn serve_once(status: StatusCode, body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        // Read the request head before answering
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let head = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            body.len()
        );
        let _ = socket.write_all(head.as_bytes()).await;
        let _ = socket.write_all(body).await;
        let _ = socket.shutdown().await;
    });

    format!("http://{}", addr)
}

/// Serves `pages[i]` at `page_url(i + 1)` and 404s everything else.
pub(crate) struct FakeFetcher {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new(pages: Vec<String>) -> Self {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, html)| (page_url(i + 1), html))
            .collect();
        Self {
            pages,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_page(&self, url: &str) -> CrawlResult<String> {
        self.requested.lock().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| CrawlError::Status {
            url: url.to_string(),
            status: StatusCode::NOT_FOUND,
        })
    }
}

/// Records download requests instead of performing them.
#[derive(Default)]
pub(crate) struct FakeDownloader {
    requests: Mutex<Vec<(String, String)>>,
    existing: HashSet<String>,
    failing: Option<String>,
}

impl FakeDownloader {
    pub(crate) fn with_existing(file_names: &[&str]) -> Self {
        Self {
            existing: file_names.iter().map(|name| name.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn failing_on(file_name: &str) -> Self {
        Self {
            failing: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    /// Every `(url, file_name)` pair requested, in order.
    pub(crate) fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().clone()
    }

    pub(crate) fn file_names(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(_, name)| name.clone()).collect()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, file_name: &str) -> CrawlResult<DownloadOutcome> {
        self.requests.lock().push((url.to_string(), file_name.to_string()));

        if self.failing.as_deref() == Some(file_name) {
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: StatusCode::BAD_GATEWAY,
            });
        }
        if self.existing.contains(file_name) {
            return Ok(DownloadOutcome::AlreadyPresent);
        }
        Ok(DownloadOutcome::Saved { bytes: 1024 })
    }
}

/// Cursor store backed by memory, remembering every write.
#[derive(Default)]
pub(crate) struct MemoryCursorStore {
    initial: Option<i64>,
    writes: Mutex<Vec<i64>>,
}

impl MemoryCursorStore {
    pub(crate) fn with_cursor(cursor: i64) -> Self {
        Self {
            initial: Some(cursor),
            ..Self::default()
        }
    }

    pub(crate) fn writes(&self) -> Vec<i64> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn read(&self) -> CrawlResult<Option<i64>> {
        Ok(self.writes.lock().last().copied().or(self.initial))
    }

    async fn write(&self, cursor: i64) -> CrawlResult<()> {
        self.writes.lock().push(cursor);
        Ok(())
    }
}

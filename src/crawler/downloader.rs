use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::crawler::error::{CrawlError, CrawlResult};

/// Image formats worth downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageFormat {
    Gif,
    Png,
}

impl ImageFormat {
    /// Detects the format from anywhere in the URL, not just its suffix, so
    /// links with query strings still qualify. GIF wins when both appear.
    pub(crate) fn detect(url: &str) -> Option<Self> {
        if url.contains(".gif") {
            Some(ImageFormat::Gif)
        } else if url.contains(".png") {
            Some(ImageFormat::Png)
        } else {
            None
        }
    }

    pub(crate) fn extension(self) -> &'static str {
        match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Png => "png",
        }
    }

    /// Artifact file name for a post, `<post_id>.<ext>`.
    pub(crate) fn file_name(self, post_id: &str) -> String {
        format!("{}.{}", post_id, self.extension())
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// What happened to a download request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DownloadOutcome {
    Saved { bytes: u64 },
    AlreadyPresent,
}

/// Fetches binary content and stores it under a given file name.
#[async_trait]
pub(crate) trait Downloader: Send + Sync {
    async fn download(&self, url: &str, file_name: &str) -> CrawlResult<DownloadOutcome>;
}

/// Streams images over HTTP into the output directory.
pub(crate) struct HttpDownloader {
    client: Client,
    output_dir: PathBuf,
}

impl HttpDownloader {
    /// Creates the downloader, making sure the output directory exists.
    pub(crate) async fn new(client: Client, output_dir: impl Into<PathBuf>) -> CrawlResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).await?;
        Ok(Self { client, output_dir })
    }

    pub(crate) fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes the response body to `temp_path`, returning the byte count.
    async fn stream_to_file(response: reqwest::Response, url: &str, temp_path: &Path) -> CrawlResult<u64> {
        let mut file = File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| CrawlError::request(url, e))?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }

        file.flush().await?;
        Ok(bytes)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, file_name: &str) -> CrawlResult<DownloadOutcome> {
        let file_path = self.output_dir.join(file_name);
        if fs::try_exists(&file_path).await? {
            debug!("File already exists: {}", file_path.display());
            return Ok(DownloadOutcome::AlreadyPresent);
        }

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

        // Partial files never land under the final name
        let temp_path = self.output_dir.join(format!(".{}.part", file_name));
        match Self::stream_to_file(response, url, &temp_path).await {
            Ok(bytes) => {
                fs::rename(&temp_path, &file_path).await?;
                Ok(DownloadOutcome::Saved { bytes })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    debug!("Failed to remove {}: {}", temp_path.display(), cleanup);
                }
                Err(e)
            }
        }
    }
}

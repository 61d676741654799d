use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::crawler::error::CrawlResult;

/// Persists the crawl cursor between runs.
#[async_trait]
pub(crate) trait CursorStore: Send + Sync {
    /// The cursor left by the previous run, or `None` on a first run.
    async fn read(&self) -> CrawlResult<Option<i64>>;

    /// Stores the cursor for the next run.
    async fn write(&self, cursor: i64) -> CrawlResult<()>;
}

/// Keeps the cursor as a decimal number in a plain text file.
#[derive(Debug, Clone)]
pub(crate) struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn read(&self) -> CrawlResult<Option<i64>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("Cursor file {} does not exist", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match content.trim().parse::<i64>() {
            Ok(cursor) => Ok(Some(cursor)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable cursor in {} ({}), treating this as a first run",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    async fn write(&self, cursor: i64) -> CrawlResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Replace atomically so an interrupted write keeps the old cursor
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        fs::write(&temp_path, cursor.to_string()).await?;
        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::crawler::SubscribedTags;

/// Name of the configuration file used when none is given on the command line.
pub(crate) const DEFAULT_CONFIG_NAME: &str = "rice_grabber.toml";

/// Listing crawled when nothing else is configured.
const DEFAULT_START_URL: &str = "https://old.reddit.com/r/unixporn/new/";

/// Window managers and setups worth keeping.
const DEFAULT_TAGS: [&str; 26] = [
    "2bwm",
    "9wm",
    "awesome",
    "awesomewm",
    "bspwm",
    "chunkwm",
    "cwm",
    "dwm",
    "evilwm",
    "exwm",
    "gaps",
    "frankenwm",
    "fvwm",
    "hlwm",
    "herbstluftwm",
    "i3",
    "i3gaps",
    "i3wm",
    "pekwm",
    "spectrwm",
    "eveningwm",
    "termux",
    "twm",
    "uwurawrxdwm",
    "icewm",
    "windowmaker",
];

// Define error types for config loading
#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// Result type alias for config operations
pub(crate) type ConfigResult<T> = Result<T, ConfigError>;

/// Where and how far to crawl.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct CrawlConfig {
    pub(crate) start_url: String,
    /// Maximum number of listing pages fetched in one run.
    pub(crate) max_pages: u32,
    /// Lookback window used when no cursor has been stored yet.
    pub(crate) max_days_fetch: u32,
    pub(crate) user_agent: String,
    /// Per-request timeout. Requests may hang indefinitely when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) request_timeout_secs: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            max_pages: 50,
            max_days_fetch: 30,
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            request_timeout_secs: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct Paths {
    /// Directory downloaded images are written to.
    pub(crate) output_directory: String,
    /// File holding the cursor between runs.
    pub(crate) cursor_file: String,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            output_directory: "images".to_string(),
            cursor_file: "timestamp.txt".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct Tags {
    /// Exact, case-insensitive tags a post needs at least one of.
    pub(crate) subscribed: Vec<String>,
}

impl Default for Tags {
    fn default() -> Self {
        Self {
            subscribed: DEFAULT_TAGS.iter().map(|tag| tag.to_string()).collect(),
        }
    }
}

/// CSS selectors describing the listing markup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub(crate) struct SelectorConfig {
    pub(crate) post_entry: String,
    pub(crate) title: String,
    pub(crate) next_page: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            post_entry: "#siteTable .thing".to_string(),
            title: "a.title".to_string(),
            next_page: ".nav-buttons .next-button a".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) crawl: CrawlConfig,
    pub(crate) paths: Paths,
    pub(crate) tags: Tags,
    pub(crate) selectors: SelectorConfig,
}

impl AppConfig {
    /// Loads the config at `path`, writing a default one first if it is missing.
    ///
    /// The returned flag is `true` when the file was just created.
    pub(crate) fn load_or_create(path: &Path) -> ConfigResult<(Self, bool)> {
        if !path.exists() {
            warn!("Config file not found: {}", path.display());
            let config = Self::default();
            config.save(path)?;
            info!("Created {} with default values", path.display());
            return Ok((config, true));
        }

        Ok((Self::load(path)?, false))
    }

    /// Reads and validates the config at `path`.
    pub(crate) fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        trace!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub(crate) fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Checks values that would make a run meaningless.
    pub(crate) fn validate(&self) -> ConfigResult<()> {
        if self.crawl.max_pages == 0 {
            return Err(ConfigError::Invalid("crawl.max_pages must be at least 1".to_string()));
        }

        Url::parse(&self.crawl.start_url).map_err(|e| {
            ConfigError::Invalid(format!("crawl.start_url `{}` is not a URL: {}", self.crawl.start_url, e))
        })?;

        if self.subscribed_tags().is_empty() {
            return Err(ConfigError::Invalid("tags.subscribed has no usable tags".to_string()));
        }

        Ok(())
    }

    /// The subscribed tags, normalized to lowercase.
    pub(crate) fn subscribed_tags(&self) -> SubscribedTags {
        SubscribedTags::new(&self.tags.subscribed)
    }

    pub(crate) fn output_directory(&self) -> PathBuf {
        PathBuf::from(&self.paths.output_directory)
    }

    pub(crate) fn cursor_file(&self) -> PathBuf {
        PathBuf::from(&self.paths.cursor_file)
    }
}

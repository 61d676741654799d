use std::env::current_dir;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Error};
use console::{style, Term};
use dialoguer::Confirm;

use crate::config::AppConfig;
use crate::crawler::{
    build_client, now_millis, run_crawl, CrawlReport, FileCursorStore, HttpDownloader,
    HttpPageFetcher, PaginationDriver, PostExtractor,
};

/// The name of the cargo package.
const NAME: &str = env!("CARGO_PKG_NAME");

/// The version of the cargo package.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The authors who created the package.
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// Values given on the command line that take precedence over the config file.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) start_url: Option<String>,
    pub(crate) max_pages: Option<u32>,
}

/// Handles the flow of one grabber run from config loading to the final report.
pub(crate) struct Program {
    config_path: PathBuf,
    overrides: Overrides,
}

impl Program {
    pub(crate) fn new(config_path: PathBuf, overrides: Overrides) -> Self {
        Self {
            config_path,
            overrides,
        }
    }

    /// Runs the grabber. An error means the cursor was not advanced.
    pub(crate) async fn run(&self) -> Result<(), Error> {
        Term::stdout().set_title("rice grabber");
        trace!("Starting rice grabber...");
        trace!("Program Name: {}", NAME);
        trace!("Program Version: {}", VERSION);
        trace!("Program Authors: {}", AUTHORS);
        let working_dir = current_dir().context("Failed to get working directory")?;
        trace!("Program Working Directory: {}", working_dir.display());

        let Some(config) = self.load_config()? else {
            return Ok(());
        };

        let client = build_client(&config.crawl)?;
        let fetcher = HttpPageFetcher::new(client.clone());
        let downloader = HttpDownloader::new(client, config.output_directory()).await?;
        let store = FileCursorStore::new(config.cursor_file());
        let extractor = PostExtractor::new(&config.selectors)?;
        let subscribed = config.subscribed_tags();
        let driver = PaginationDriver::new(&fetcher, &extractor, &downloader, &subscribed);

        info!(
            "Crawling {} for {} subscribed tags, saving into {}",
            style(&config.crawl.start_url).bold(),
            subscribed.len(),
            style(downloader.output_dir().display()).bold()
        );
        trace!("Cursor file: {}", store.path().display());

        match run_crawl(&driver, &store, &config.crawl, now_millis()).await {
            Ok(report) => {
                Self::print_report(&report);
                Ok(())
            }
            Err(e) => {
                error!("Run did not complete: {}", e);
                error!(
                    "The cursor in {} was not advanced; the next run retries the same window",
                    style(store.path().display()).bold()
                );
                Err(e.into())
            }
        }
    }

    /// Loads the config file and applies command line overrides.
    ///
    /// Returns `None` when the user chose to stop and edit a freshly created config.
    fn load_config(&self) -> Result<Option<AppConfig>, Error> {
        trace!("Checking config file {}...", self.config_path.display());
        let (mut config, created) = AppConfig::load_or_create(&self.config_path)
            .with_context(|| format!("Failed to load {}", self.config_path.display()))?;

        if created && std::io::stdin().is_terminal() && Self::confirm_exit_to_edit() {
            info!(
                "Exiting so you can edit {} to list the tags you want.",
                self.config_path.display()
            );
            return Ok(None);
        }

        if let Some(start_url) = &self.overrides.start_url {
            config.crawl.start_url = start_url.clone();
        }
        if let Some(max_pages) = self.overrides.max_pages {
            config.crawl.max_pages = max_pages;
        }
        config.validate()?;

        Ok(Some(config))
    }

    fn confirm_exit_to_edit() -> bool {
        match Confirm::new()
            .with_prompt("A default config was created. Exit to edit it before crawling?")
            .default(true)
            .interact()
        {
            Ok(confirmed) => confirmed,
            Err(err) => {
                warn!("Failed to get user input: {}", err);
                warn!("Continuing with the default config.");
                false
            }
        }
    }

    fn print_report(report: &CrawlReport) {
        let context = &report.context;
        let stats = context.stats();
        let skip_log = context.skip_log();

        if skip_log.is_empty() {
            info!("TAGS SKIPPED: none");
        } else {
            let skipped: Vec<&str> = skip_log.iter().collect();
            info!("TAGS SKIPPED ({}): {}", skip_log.len(), style(skipped.join(", ")).bold());
        }
        info!("{}", "-".repeat(80));
        info!(
            "Finished ({:?}) on page {} after {} fetch(es): {} downloaded ({} bytes), {} already present",
            report.terminal_state,
            context.page_count(),
            stats.pages_fetched,
            style(stats.downloaded).green(),
            stats.bytes_downloaded,
            stats.already_present
        );
        info!(
            "Skipped {} untagged, {} unwanted, {} unsupported of {} new posts",
            stats.untagged, stats.unwanted, stats.unsupported_format, stats.posts_processed
        );
    }
}

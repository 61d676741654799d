use chrono::{TimeDelta, Utc};
use console::style;

use crate::config::CrawlConfig;

pub(crate) mod cursor;
pub(crate) mod downloader;
pub(crate) mod driver;
pub(crate) mod error;
pub(crate) mod extractor;
pub(crate) mod fetcher;
pub(crate) mod post;
pub(crate) mod tags;

#[cfg(test)]
pub(crate) mod testing;

pub(crate) use cursor::{CursorStore, FileCursorStore};
pub(crate) use downloader::HttpDownloader;
pub(crate) use driver::{PaginationDriver, RunContext, TerminalState};
pub(crate) use error::CrawlResult;
pub(crate) use extractor::PostExtractor;
pub(crate) use fetcher::{build_client, HttpPageFetcher};
pub(crate) use tags::SubscribedTags;

/// Result of a crawl that reached a terminal state and saved its cursor.
#[derive(Debug)]
pub(crate) struct CrawlReport {
    pub(crate) terminal_state: TerminalState,
    pub(crate) context: RunContext,
}

/// Runs one incremental crawl.
///
/// The previous cursor is loaded from `store` (or defaulted to
/// `max_days_fetch` days before `started_at`), the listing is walked, and
/// `started_at` becomes the new cursor. If the walk fails the stored cursor
/// is left as it was.
pub(crate) async fn run_crawl(
    driver: &PaginationDriver<'_>,
    store: &dyn CursorStore,
    config: &CrawlConfig,
    started_at: i64,
) -> CrawlResult<CrawlReport> {
    let cursor = resolve_cursor(store, config.max_days_fetch, started_at).await?;
    let mut context = RunContext::new(cursor, started_at);
    debug!("Run {} starting with cursor {}", context.run_id(), context.cursor());

    let terminal_state = driver
        .run(&mut context, &config.start_url, config.max_pages)
        .await?;
    debug!("Run {} finished: {:?}", context.run_id(), terminal_state);

    info!("{}", "-".repeat(80));
    info!("SAVING LAST TIMESTAMP {}..", style(context.started_at()).bold());
    store.write(context.started_at()).await?;

    Ok(CrawlReport {
        terminal_state,
        context,
    })
}

/// Loads the stored cursor, falling back to a lookback window on first run.
async fn resolve_cursor(store: &dyn CursorStore, max_days_fetch: u32, now: i64) -> CrawlResult<i64> {
    match store.read().await? {
        Some(cursor) => {
            info!(
                "Cursor loaded. Last run was {} ago",
                style(describe_elapsed(now.saturating_sub(cursor))).bold()
            );
            Ok(cursor)
        }
        None => {
            warn!(
                "No cursor was found, fetching the last {} days or until the page limit",
                style(max_days_fetch).bold()
            );
            Ok(now.saturating_sub(TimeDelta::days(i64::from(max_days_fetch)).num_milliseconds()))
        }
    }
}

/// Current wall clock time in epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Formats a millisecond span for humans, e.g. `2d 3h` or `45s`.
pub(crate) fn describe_elapsed(millis: i64) -> String {
    let secs = millis.max(0) / 1000;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlConfig, SelectorConfig};
    use crate::crawler::testing::{
        listing, page_url, post, FakeDownloader, FakeFetcher, MemoryCursorStore,
    };

    const DAY_MS: i64 = 86_400_000;

    fn crawl_config(max_pages: u32) -> CrawlConfig {
        CrawlConfig {
            start_url: page_url(1),
            max_pages,
            ..CrawlConfig::default()
        }
    }

    #[tokio::test]
    async fn test_cursor_is_run_start_not_post_time() {
        let started_at = 1_700_000_000_000;
        let fetcher = FakeFetcher::new(vec![listing(
            &[
                // Posted after the run began
                post("t3_late", "https://i.redd.it/late.png", started_at + 5_000, "[dwm]"),
                post("t3_a", "https://i.redd.it/a.png", started_at - 1_000, "[dwm]"),
            ],
            None,
        )]);
        let downloader = FakeDownloader::default();
        let extractor = PostExtractor::new(&SelectorConfig::default()).unwrap();
        let subscribed = SubscribedTags::new(["dwm"]);
        let driver = PaginationDriver::new(&fetcher, &extractor, &downloader, &subscribed);
        let store = MemoryCursorStore::with_cursor(started_at - DAY_MS);

        let report = run_crawl(&driver, &store, &crawl_config(50), started_at)
            .await
            .unwrap();

        assert_eq!(report.terminal_state, TerminalState::NoNextPage);
        assert_eq!(store.writes(), vec![started_at]);
        assert_eq!(report.context.started_at(), started_at);
        assert_eq!(downloader.file_names(), vec!["t3_late.png", "t3_a.png"]);
    }

    #[tokio::test]
    async fn test_cursor_saved_on_page_limit_and_cutoff() {
        let started_at = 50_000;
        let pages = vec![
            listing(&[post("t3_1", "u.png", 40_000, "[dwm]")], Some(&page_url(2))),
            listing(&[post("t3_2", "u.png", 30_000, "[dwm]")], Some(&page_url(3))),
        ];

        let fetcher = FakeFetcher::new(pages);
        let downloader = FakeDownloader::default();
        let extractor = PostExtractor::new(&SelectorConfig::default()).unwrap();
        let subscribed = SubscribedTags::new(["dwm"]);
        let driver = PaginationDriver::new(&fetcher, &extractor, &downloader, &subscribed);

        let store = MemoryCursorStore::with_cursor(0);
        let report = run_crawl(&driver, &store, &crawl_config(1), started_at).await.unwrap();
        assert_eq!(report.terminal_state, TerminalState::PageLimitReached);
        assert_eq!(store.writes(), vec![started_at]);

        let store = MemoryCursorStore::with_cursor(35_000);
        let report = run_crawl(&driver, &store, &crawl_config(50), started_at).await.unwrap();
        assert_eq!(report.terminal_state, TerminalState::CutoffReached);
        assert_eq!(store.writes(), vec![started_at]);
    }

    #[tokio::test]
    async fn test_failed_run_keeps_cursor() {
        let started_at = 50_000;
        // Page 2 is linked but never served
        let fetcher = FakeFetcher::new(vec![listing(
            &[post("t3_1", "u.png", 40_000, "[dwm]")],
            Some(&page_url(2)),
        )]);
        let downloader = FakeDownloader::default();
        let extractor = PostExtractor::new(&SelectorConfig::default()).unwrap();
        let subscribed = SubscribedTags::new(["dwm"]);
        let driver = PaginationDriver::new(&fetcher, &extractor, &downloader, &subscribed);
        let store = MemoryCursorStore::with_cursor(10_000);

        let result = run_crawl(&driver, &store, &crawl_config(50), started_at).await;

        assert!(result.is_err());
        assert!(store.writes().is_empty());
        assert_eq!(store.read().await.unwrap(), Some(10_000));
    }

    #[tokio::test]
    async fn test_first_run_uses_lookback_window() {
        let started_at = 100 * DAY_MS;
        let fetcher = FakeFetcher::new(vec![listing(
            &[
                post("t3_new", "u.png", started_at - DAY_MS, "[dwm]"),
                post("t3_old", "u.png", started_at - 31 * DAY_MS, "[dwm]"),
            ],
            Some(&page_url(2)),
        )]);
        let downloader = FakeDownloader::default();
        let extractor = PostExtractor::new(&SelectorConfig::default()).unwrap();
        let subscribed = SubscribedTags::new(["dwm"]);
        let driver = PaginationDriver::new(&fetcher, &extractor, &downloader, &subscribed);
        let store = MemoryCursorStore::default();

        let report = run_crawl(&driver, &store, &crawl_config(50), started_at).await.unwrap();

        assert_eq!(report.context.cursor(), started_at - 30 * DAY_MS);
        assert_eq!(report.terminal_state, TerminalState::CutoffReached);
        assert_eq!(downloader.file_names(), vec!["t3_new.png"]);
        assert_eq!(fetcher.requested(), vec![page_url(1)]);
    }

    #[test]
    fn test_describe_elapsed() {
        assert_eq!(describe_elapsed(-5), "0s");
        assert_eq!(describe_elapsed(42_000), "42s");
        assert_eq!(describe_elapsed(125_000), "2m 5s");
        assert_eq!(describe_elapsed(3 * 3_600_000 + 60_000), "3h 1m");
        assert_eq!(describe_elapsed(2 * DAY_MS + 3_600_000), "2d 1h");
    }
}

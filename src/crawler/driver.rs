use console::style;
use uuid::Uuid;

use crate::crawler::downloader::{DownloadOutcome, Downloader, ImageFormat};
use crate::crawler::error::CrawlResult;
use crate::crawler::extractor::PostExtractor;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::post::Post;
use crate::crawler::tags::{classify, parse_tags, SkipLog, SubscribedTags, TagMatch};

/// Why the page loop stopped. Every state leads to cursor persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminalState {
    /// A post at or before the cursor was found.
    CutoffReached,
    /// `max_pages` pages were processed.
    PageLimitReached,
    /// The last page had no link to a following page.
    NoNextPage,
}

/// Counters collected while a run progresses.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct RunStats {
    pub(crate) pages_fetched: u32,
    pub(crate) posts_processed: usize,
    pub(crate) untagged: usize,
    pub(crate) unwanted: usize,
    pub(crate) unsupported_format: usize,
    pub(crate) downloaded: usize,
    pub(crate) already_present: usize,
    pub(crate) bytes_downloaded: u64,
}

/// State owned by a single crawl run.
#[derive(Debug)]
pub(crate) struct RunContext {
    run_id: Uuid,
    cursor: i64,
    started_at: i64,
    page_count: u32,
    skip_log: SkipLog,
    stats: RunStats,
}

impl RunContext {
    /// Starts a run that skips posts at or before `cursor`. `started_at` is
    /// the cursor the run persists once it finishes.
    pub(crate) fn new(cursor: i64, started_at: i64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            cursor,
            started_at,
            page_count: 1,
            skip_log: SkipLog::default(),
            stats: RunStats::default(),
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn cursor(&self) -> i64 {
        self.cursor
    }

    pub(crate) fn started_at(&self) -> i64 {
        self.started_at
    }

    /// 1-based number of the page being (or last) processed.
    pub(crate) fn page_count(&self) -> u32 {
        self.page_count
    }

    pub(crate) fn skip_log(&self) -> &SkipLog {
        &self.skip_log
    }

    pub(crate) fn stats(&self) -> &RunStats {
        &self.stats
    }
}

enum PageOutcome {
    Continue { next_page_url: Option<String> },
    CutoffReached,
}

/// Walks listing pages newest first, downloading subscribed images until the
/// cursor, the page cap or the end of the listing is reached.
///
/// Work is strictly sequential: a page is fetched, then each of its posts is
/// handled in order with downloads awaited one at a time, and only then is
/// the next page requested.
pub(crate) struct PaginationDriver<'a> {
    fetcher: &'a dyn PageFetcher,
    extractor: &'a PostExtractor,
    downloader: &'a dyn Downloader,
    subscribed: &'a SubscribedTags,
}

impl<'a> PaginationDriver<'a> {
    pub(crate) fn new(
        fetcher: &'a dyn PageFetcher,
        extractor: &'a PostExtractor,
        downloader: &'a dyn Downloader,
        subscribed: &'a SubscribedTags,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            downloader,
            subscribed,
        }
    }

    /// Crawls from `start_url`, fetching at most `max_pages` pages.
    ///
    /// Any fetch or download failure aborts the crawl with an error.
    pub(crate) async fn run(
        &self,
        ctx: &mut RunContext,
        start_url: &str,
        max_pages: u32,
    ) -> CrawlResult<TerminalState> {
        let mut url = start_url.to_string();

        loop {
            info!("PROCESSING PAGE {}", style(ctx.page_count).bold());

            let next_page_url = match self.process_page(ctx, &url).await? {
                PageOutcome::CutoffReached => return Ok(TerminalState::CutoffReached),
                PageOutcome::Continue { next_page_url } => next_page_url,
            };

            let Some(next_page_url) = next_page_url else {
                info!("No further pages after page {}", ctx.page_count);
                return Ok(TerminalState::NoNextPage);
            };

            if ctx.page_count >= max_pages {
                info!("Page limit of {} reached", style(max_pages).bold());
                return Ok(TerminalState::PageLimitReached);
            }

            ctx.page_count += 1;
            url = next_page_url;
        }
    }

    async fn process_page(&self, ctx: &mut RunContext, url: &str) -> CrawlResult<PageOutcome> {
        let html = self.fetcher.fetch_page(url).await?;
        ctx.stats.pages_fetched += 1;

        let page = self.extractor.extract(url, &html);
        trace!(
            "Page {} has {} posts, next page: {:?}",
            ctx.page_count,
            page.posts.len(),
            page.next_page_url
        );

        for (index, post) in page.posts.iter().enumerate() {
            // Listings are newest first, so nothing after this post is new either
            if post.timestamp() <= ctx.cursor {
                info!(
                    "{} timestamp reached at {} ({} <= {})",
                    style("ABORTING:").bold(),
                    post.id(),
                    post.timestamp(),
                    ctx.cursor
                );
                return Ok(PageOutcome::CutoffReached);
            }

            self.process_post(ctx, index, post).await?;
        }

        Ok(PageOutcome::Continue {
            next_page_url: page.next_page_url,
        })
    }

    async fn process_post(&self, ctx: &mut RunContext, index: usize, post: &Post) -> CrawlResult<()> {
        ctx.stats.posts_processed += 1;
        let marker = style(format!("#{}", index)).bold();

        let tokens = parse_tags(post.title());
        let verdict = classify(tokens.as_deref(), self.subscribed, &mut ctx.skip_log);

        let tag = match verdict {
            TagMatch::Untagged => {
                ctx.stats.untagged += 1;
                info!(
                    "..{} SKIP: no tags in {} at {}",
                    marker,
                    style(post.title()).bold(),
                    style(post.source_url()).bold()
                );
                return Ok(());
            }
            TagMatch::Unwanted => {
                ctx.stats.unwanted += 1;
                info!(
                    "..{} SKIP: unwanted tag(s) [{}] at {}",
                    marker,
                    style(tokens.unwrap_or_default().join(", ")).bold(),
                    style(post.source_url()).bold()
                );
                return Ok(());
            }
            TagMatch::Matched { tag } => tag,
        };

        let Some(format) = ImageFormat::detect(post.source_url()) else {
            ctx.stats.unsupported_format += 1;
            info!(
                "..{} SKIP: not png {} [{}] from {}",
                marker,
                style(post.id()).bold(),
                style(&tag).bold(),
                style(post.source_url()).bold()
            );
            return Ok(());
        };

        info!(
            "..{} {}: downloading {} {} [{}] from {}",
            marker,
            style("GET").green(),
            format,
            style(post.id()).bold(),
            style(&tag).bold(),
            style(post.source_url()).bold()
        );

        let file_name = format.file_name(post.id());
        match self.downloader.download(post.source_url(), &file_name).await? {
            DownloadOutcome::Saved { bytes } => {
                ctx.stats.downloaded += 1;
                ctx.stats.bytes_downloaded += bytes;
                debug!("Saved {} ({} bytes)", file_name, bytes);
            }
            DownloadOutcome::AlreadyPresent => {
                ctx.stats.already_present += 1;
                debug!("{} is already present, left untouched", file_name);
            }
        }

        Ok(())
    }
}

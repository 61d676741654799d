use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SelectorConfig;
use crate::crawler::error::{CrawlError, CrawlResult};
use crate::crawler::post::{ListingPage, Post};

/// Attribute carrying the post identifier on a listing entry.
const ID_ATTR: &str = "data-fullname";

/// Attribute carrying the linked content URL.
const URL_ATTR: &str = "data-url";

/// Attribute carrying the creation time in epoch milliseconds.
const TIMESTAMP_ATTR: &str = "data-timestamp";

/// Parses listing pages into posts using a fixed set of CSS selectors.
#[derive(Debug)]
pub(crate) struct PostExtractor {
    post_entry: Selector,
    title: Selector,
    next_page: Selector,
}

impl PostExtractor {
    /// Compiles the configured selectors. Fails if any of them is not valid CSS.
    pub(crate) fn new(selectors: &SelectorConfig) -> CrawlResult<Self> {
        Ok(Self {
            post_entry: compile(&selectors.post_entry)?,
            title: compile(&selectors.title)?,
            next_page: compile(&selectors.next_page)?,
        })
    }

    /// Extracts the ordered posts and the next-page link from `html`.
    ///
    /// `page_url` is used to resolve a relative next-page link. Entries that
    /// lack an id, a URL or a numeric timestamp are skipped, as are entries
    /// whose id cannot be used as a file name.
    pub(crate) fn extract(&self, page_url: &str, html: &str) -> ListingPage {
        let document = Html::parse_document(html);

        let posts = document
            .select(&self.post_entry)
            .enumerate()
            .filter_map(|(index, entry)| self.extract_post(index, entry))
            .collect();

        let next_page_url = document
            .select(&self.next_page)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .and_then(|href| match resolve(page_url, href) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Ignoring next page link: {}", e);
                    None
                }
            });

        ListingPage {
            posts,
            next_page_url,
        }
    }

    fn extract_post(&self, index: usize, entry: ElementRef<'_>) -> Option<Post> {
        let attrs = entry.value();
        let (Some(id), Some(url)) = (attrs.attr(ID_ATTR), attrs.attr(URL_ATTR)) else {
            warn!("Entry #{} is missing `{}` or `{}`, skipping it", index, ID_ATTR, URL_ATTR);
            return None;
        };

        if !is_safe_file_stem(id) {
            warn!("Entry #{} has unusable id `{}`, skipping it", index, id);
            return None;
        }

        let timestamp = match attrs.attr(TIMESTAMP_ATTR).map(|t| t.trim().parse::<i64>()) {
            Some(Ok(timestamp)) => timestamp,
            _ => {
                warn!("Entry {} has no usable `{}`, skipping it", id, TIMESTAMP_ATTR);
                return None;
            }
        };

        let title: String = entry
            .select(&self.title)
            .flat_map(|title| title.text())
            .collect();

        Some(Post::new(id, url, timestamp, &title))
    }
}

fn compile(selector: &str) -> CrawlResult<Selector> {
    Selector::parse(selector).map_err(|e| CrawlError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Post ids become `<id>.<ext>` inside the output directory, so they must
/// stay a single path component.
fn is_safe_file_stem(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.contains("..")
}

/// Joins `href` onto `base`.
fn resolve(base: &str, href: &str) -> CrawlResult<String> {
    let invalid = |url: &str, source| CrawlError::InvalidUrl {
        url: url.to_string(),
        source,
    };
    let base = Url::parse(base).map_err(|e| invalid(base, e))?;
    let joined = base.join(href).map_err(|e| invalid(href, e))?;
    Ok(joined.to_string())
}

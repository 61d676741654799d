use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// Bracket groups in a post title, e.g. `[i3wm]` or `[Arch/KDE]`.
static TAG_GROUP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(.*?)\]").expect("tag group pattern is a valid regex")
});

/// Characters that split a bracket group into separate tokens.
const TAG_SEPARATORS: [char; 3] = ['+', '/', ' '];

/// Extracts normalized tag tokens from a post title.
///
/// Returns `None` when the title has no bracket group at all, which is a
/// different answer from a group that yields no tokens (`Some(vec![])`).
/// Tokens keep title order across groups and are not deduplicated.
pub(crate) fn parse_tags(title: &str) -> Option<Vec<String>> {
    let mut groups = TAG_GROUP_PATTERN.captures_iter(title).peekable();
    groups.peek()?;

    let mut tokens = Vec::new();
    for group in groups {
        let content = group.get(1).map_or("", |m| m.as_str()).to_lowercase();
        tokens.extend(
            content
                .split(TAG_SEPARATORS)
                .filter(|fragment| !fragment.is_empty())
                .map(str::to_string),
        );
    }

    Some(tokens)
}

/// The allow-list of tags a post must carry at least one of to be downloaded.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubscribedTags {
    tags: HashSet<String>,
}

impl SubscribedTags {
    /// Builds the set from raw configured strings, trimming and lowercasing
    /// each one and dropping entries that end up empty.
    pub(crate) fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = raw
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        Self { tags }
    }

    pub(crate) fn contains(&self, token: &str) -> bool {
        self.tags.contains(token)
    }

    pub(crate) fn len(&self) -> usize {
        self.tags.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Unsubscribed tokens seen during one run, kept for operator review.
///
/// Ordered so the end-of-run report comes out sorted.
#[derive(Debug, Default)]
pub(crate) struct SkipLog {
    tokens: BTreeSet<String>,
}

impl SkipLog {
    pub(crate) fn record(&mut self, token: &str) {
        if !self.contains(token) {
            self.tokens.insert(token.to_string());
        }
    }

    pub(crate) fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Skipped tokens in sorted order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

/// Outcome of checking a post's tokens against the subscribed tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TagMatch {
    /// The title had no bracket groups.
    Untagged,
    /// None of the tokens are subscribed.
    Unwanted,
    /// `tag` is the first subscribed token found.
    Matched { tag: String },
}

/// Decides whether a post's tokens intersect the subscribed tags.
///
/// Scanning stops at the first subscribed token. Every unsubscribed token
/// inspected before that point goes into `skip_log`.
pub(crate) fn classify(
    tokens: Option<&[String]>,
    subscribed: &SubscribedTags,
    skip_log: &mut SkipLog,
) -> TagMatch {
    let Some(tokens) = tokens else {
        return TagMatch::Untagged;
    };

    for token in tokens {
        if subscribed.contains(token) {
            return TagMatch::Matched { tag: token.clone() };
        }
        skip_log.record(token);
    }

    TagMatch::Unwanted
}

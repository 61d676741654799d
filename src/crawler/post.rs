/// A single listing entry, immutable once extracted from a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Post {
    id: String,
    source_url: String,
    timestamp: i64,
    title: String,
}

impl Post {
    pub(crate) fn new(id: &str, source_url: &str, timestamp: i64, title: &str) -> Self {
        Post {
            id: id.to_string(),
            source_url: source_url.to_string(),
            timestamp,
            title: title.to_string(),
        }
    }

    /// Opaque listing identifier, also used as the artifact file stem.
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Creation time in epoch milliseconds.
    pub(crate) fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub(crate) fn title(&self) -> &str {
        &self.title
    }
}

/// Everything extracted from one listing page.
#[derive(Debug, Default)]
pub(crate) struct ListingPage {
    pub(crate) posts: Vec<Post>,
    pub(crate) next_page_url: Option<String>,
}

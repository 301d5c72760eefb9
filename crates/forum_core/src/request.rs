use url::Url;

use crate::ExtractMode;

pub const DEFAULT_FORUM_BASE: &str = "https://www.4d4y.com/forum/";

/// Where the forum lives. Every request URL and every resolved image URL is
/// derived from this base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    base: Url,
}

impl SiteConfig {
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let mut url = Url::parse(base)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self { base: url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `scheme://host[:port]` of the forum.
    pub fn origin(&self) -> String {
        self.base.origin().ascii_serialization()
    }

    /// Resolve `reference` against the forum base path.
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        self.base.join(reference.trim()).ok()
    }

    pub fn listing_url(&self, forum_id: &str, page: u32) -> String {
        format!(
            "{}forumdisplay.php?fid={}&page={}",
            self.base,
            forum_id,
            page.max(1)
        )
    }

    pub fn thread_url(&self, thread_id: &str, page: u32) -> String {
        format!(
            "{}viewthread.php?tid={}&page={}",
            self.base,
            thread_id,
            page.max(1)
        )
    }

    pub fn login_url(&self) -> String {
        format!("{}logging.php?action=login", self.base)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FORUM_BASE).expect("default forum base url is valid")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Listing { forum_id: String },
    Thread { thread_id: String, mode: ExtractMode },
}

/// One page of a listing or a thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub kind: RequestKind,
    pub page: u32,
}

impl PageRequest {
    pub fn listing(forum_id: impl Into<String>, page: u32) -> Self {
        Self {
            kind: RequestKind::Listing {
                forum_id: forum_id.into(),
            },
            page: page.max(1),
        }
    }

    pub fn thread(thread_id: impl Into<String>, page: u32, mode: ExtractMode) -> Self {
        Self {
            kind: RequestKind::Thread {
                thread_id: thread_id.into(),
                mode,
            },
            page: page.max(1),
        }
    }

    pub fn url(&self, site: &SiteConfig) -> String {
        match &self.kind {
            RequestKind::Listing { forum_id } => site.listing_url(forum_id, self.page),
            RequestKind::Thread { thread_id, .. } => site.thread_url(thread_id, self.page),
        }
    }

    /// Cache key for this page. Extraction mode is deliberately not part of
    /// it: both modes read the same document.
    pub fn cache_key(&self, site: &SiteConfig) -> String {
        self.url(site)
    }

    pub fn mode(&self) -> Option<ExtractMode> {
        match &self.kind {
            RequestKind::Listing { .. } => None,
            RequestKind::Thread { mode, .. } => Some(*mode),
        }
    }
}

//! Classified-success HTML to canonical listing and thread records.
mod listing;
mod rich;
pub mod rules;
mod thread;
mod trim;

use forum_core::{ExtractMode, ListingPage, SiteConfig, ThreadPage, DEFAULT_QUICK_LIMIT};
use thiserror::Error;

use crate::excerpt::{excerpt, DEFAULT_EXCERPT_LEN};

pub use trim::trim_thread_html;

pub const DEFAULT_TRIM_THRESHOLD: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Post count of [`ExtractSettings::quick_mode`].
    pub quick_limit: usize,
    /// Thread pages at least this long are trimmed before parsing.
    pub trim_threshold: usize,
    /// A listing with fewer rows is treated as a structural failure.
    pub min_listing_rows: usize,
    pub excerpt_len: usize,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            quick_limit: DEFAULT_QUICK_LIMIT,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            min_listing_rows: 1,
            excerpt_len: DEFAULT_EXCERPT_LEN,
        }
    }
}

impl ExtractSettings {
    pub fn quick_mode(&self) -> ExtractMode {
        ExtractMode::Quick {
            limit: self.quick_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The page does not have the shape of the expected page kind.
    #[error("structural parse error: {reason}")]
    Structural { reason: String, excerpt: String },
    #[error("extraction aborted: {0}")]
    Aborted(String),
}

impl ParseError {
    pub(crate) fn structural(reason: impl Into<String>, html: &str, max_bytes: usize) -> Self {
        ParseError::Structural {
            reason: reason.into(),
            excerpt: excerpt(html, max_bytes),
        }
    }

    pub fn excerpt(&self) -> Option<&str> {
        match self {
            ParseError::Structural { excerpt, .. } => Some(excerpt),
            ParseError::Aborted(_) => None,
        }
    }
}

/// Turns forum pages into records. Pure and synchronous; callers on an async
/// runtime should run it on a blocking thread.
#[derive(Debug, Clone, Default)]
pub struct ForumExtractor {
    site: SiteConfig,
    settings: ExtractSettings,
}

impl ForumExtractor {
    pub fn new(site: SiteConfig, settings: ExtractSettings) -> Self {
        Self { site, settings }
    }

    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    pub fn extract_listing(&self, html: &str) -> Result<ListingPage, ParseError> {
        listing::extract_listing(html, &self.settings)
    }

    pub fn extract_thread(&self, html: &str, mode: ExtractMode) -> Result<ThreadPage, ParseError> {
        thread::extract_thread(html, mode, &self.site, &self.settings)
    }
}

use std::fmt;

use serde::Serialize;

/// Number of posts extracted by a quick-mode parse unless the caller asks otherwise.
pub const DEFAULT_QUICK_LIMIT: usize = 3;

/// A page the forum served instead of the requested content.
///
/// Obstacles are never retried: retrying cannot change the outcome, so
/// escalation (render fallback, re-login) is up to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObstacleKind {
    AntiBotChallenge,
    AuthenticationRequired,
    HumanVerificationRequired,
    PermissionDenied,
}

impl fmt::Display for ObstacleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObstacleKind::AntiBotChallenge => write!(f, "anti-bot challenge"),
            ObstacleKind::AuthenticationRequired => write!(f, "authentication required"),
            ObstacleKind::HumanVerificationRequired => write!(f, "human verification required"),
            ObstacleKind::PermissionDenied => write!(f, "permission denied"),
        }
    }
}

/// How much effort a thread-page extraction spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
pub enum ExtractMode {
    /// First `limit` posts only, image tags stripped, no image resolution.
    Quick { limit: usize },
    /// Every post, sanitized, images resolved to absolute URLs.
    #[default]
    Full,
}

impl ExtractMode {
    pub fn quick() -> Self {
        ExtractMode::Quick {
            limit: DEFAULT_QUICK_LIMIT,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ExtractMode::Full)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub id: String,
    pub title: String,
    pub author_name: String,
    pub author_uid: String,
    pub post_date: String,
    pub reply_count: u32,
    pub view_count: u32,
    pub last_poster_name: String,
    pub last_post_time: String,
    /// Always at least 1.
    pub thread_page_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub thread_id: String,
    pub post_id: String,
    pub page_number: u32,
    /// HTML of a single post body.
    pub rich_content: String,
    pub plain_text: String,
    pub author_name: String,
    pub post_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingPage {
    pub threads: Vec<ThreadSummary>,
    pub current_page: u32,
    /// Present iff `current_page < last_page`.
    pub next_page_locator: Option<String>,
    pub last_page: u32,
    /// Rows dropped because a required field could not be extracted.
    pub skipped_rows: usize,
}

impl ListingPage {
    pub fn has_next(&self) -> bool {
        self.next_page_locator.is_some() && self.current_page < self.last_page
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadPage {
    pub thread_id: String,
    pub posts: Vec<PostRecord>,
    pub current_page: u32,
    pub last_page: u32,
    pub mode: ExtractMode,
    /// Posts dropped because their extraction failed.
    pub skipped_posts: usize,
}

/// Where a delivered page came from.
///
/// A single request may see a `Stale` delivery followed by a `Fresh` one for
/// the same page; `Cached` and `Fresh` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Freshness {
    /// Served from cache within its staleness window.
    Cached,
    /// Served from cache past its window; a refresh follows.
    Stale,
    /// Fetched and parsed for this request.
    Fresh,
}

impl Freshness {
    pub fn is_final(&self) -> bool {
        !matches!(self, Freshness::Stale)
    }
}

/// A parsed page of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PageData {
    Listing(ListingPage),
    Thread(ThreadPage),
}

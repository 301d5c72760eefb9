use crate::{Freshness, PostRecord, ReaderStatus, RequestKind, ThreadSummary};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderView {
    pub feed: Option<RequestKind>,
    pub status: ReaderStatus,
    pub current_page: u32,
    pub last_page: u32,
    pub has_more: bool,
    /// Listing rows of every loaded page, in page order.
    pub threads: Vec<ThreadSummary>,
    /// Posts of every loaded page, in page order, after the author filter.
    pub posts: Vec<PostRecord>,
    pub only_author: bool,
    pub thread_author: Option<String>,
    pub last_error: Option<String>,
    pub freshness: Option<Freshness>,
    pub dirty: bool,
}

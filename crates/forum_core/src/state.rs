use std::collections::BTreeMap;

use crate::view_model::ReaderView;
use crate::{
    Freshness, ListingPage, ObstacleKind, PageRequest, PostRecord, RequestKind, ThreadPage,
    ThreadSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Blocked(ObstacleKind),
    Failed,
}

/// Paging state for one listing or one thread.
///
/// Pages are keyed by page number so a repeated delivery of the same page
/// replaces the earlier copy instead of appending duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReaderState {
    feed: Option<RequestKind>,
    status: ReaderStatus,
    in_flight: Option<PageRequest>,
    current_page: u32,
    last_page: u32,
    next_page_locator: Option<String>,
    listing_pages: BTreeMap<u32, Vec<ThreadSummary>>,
    thread_pages: BTreeMap<u32, Vec<PostRecord>>,
    thread_author: Option<String>,
    only_author: bool,
    last_error: Option<String>,
    freshness: Option<Freshness>,
    dirty: bool,
}

impl ReaderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> ReaderView {
        let threads = self.listing_pages.values().flatten().cloned().collect();
        let posts = self
            .thread_pages
            .values()
            .flatten()
            .filter(|post| self.passes_author_filter(post))
            .cloned()
            .collect();
        ReaderView {
            feed: self.feed.clone(),
            status: self.status,
            current_page: self.current_page,
            last_page: self.last_page,
            has_more: self.has_more(),
            threads,
            posts,
            only_author: self.only_author,
            thread_author: self.thread_author.clone(),
            last_error: self.last_error.clone(),
            freshness: self.freshness,
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn feed(&self) -> Option<&RequestKind> {
        self.feed.as_ref()
    }

    pub fn status(&self) -> ReaderStatus {
        self.status
    }

    pub fn in_flight(&self) -> Option<&PageRequest> {
        self.in_flight.as_ref()
    }

    pub fn has_more(&self) -> bool {
        match self.feed {
            Some(RequestKind::Listing { .. }) => {
                self.next_page_locator.is_some() && self.current_page < self.last_page
            }
            Some(RequestKind::Thread { .. }) => self.current_page < self.last_page,
            None => false,
        }
    }

    pub(crate) fn open(&mut self, feed: RequestKind) -> PageRequest {
        *self = Self {
            feed: Some(feed.clone()),
            only_author: self.only_author,
            ..Self::default()
        };
        let request = PageRequest { kind: feed, page: 1 };
        self.begin(request.clone());
        request
    }

    pub(crate) fn begin(&mut self, request: PageRequest) {
        self.status = ReaderStatus::Loading;
        self.in_flight = Some(request);
        self.last_error = None;
        self.dirty = true;
    }

    /// Whether `request` belongs to the feed currently being read.
    pub(crate) fn is_current(&self, request: &PageRequest) -> bool {
        self.feed.as_ref() == Some(&request.kind)
    }

    pub(crate) fn next_request(&self) -> Option<PageRequest> {
        let feed = self.feed.clone()?;
        Some(PageRequest {
            kind: feed,
            page: self.current_page + 1,
        })
    }

    pub(crate) fn apply_listing(&mut self, page: ListingPage, freshness: Freshness) {
        self.current_page = self.current_page.max(page.current_page);
        self.last_page = page.last_page.max(self.current_page);
        self.next_page_locator = page.next_page_locator;
        self.listing_pages.insert(page.current_page, page.threads);
        self.finish_delivery(freshness);
    }

    pub(crate) fn apply_thread(&mut self, page: ThreadPage, freshness: Freshness) {
        if self.thread_author.is_none() {
            self.thread_author = page
                .posts
                .iter()
                .map(|post| post.author_name.trim())
                .find(|name| !name.is_empty())
                .map(ToOwned::to_owned);
        }
        self.current_page = self.current_page.max(page.current_page);
        self.last_page = self
            .last_page
            .max(page.last_page)
            .max(self.current_page);
        self.thread_pages.insert(page.current_page, page.posts);
        self.finish_delivery(freshness);
    }

    pub(crate) fn apply_failure(&mut self, status: ReaderStatus, message: Option<String>) {
        self.status = status;
        self.in_flight = None;
        self.last_error = message;
        self.dirty = true;
    }

    pub(crate) fn toggle_only_author(&mut self) {
        self.only_author = !self.only_author;
        self.dirty = true;
    }

    fn finish_delivery(&mut self, freshness: Freshness) {
        self.freshness = Some(freshness);
        if freshness.is_final() {
            self.status = ReaderStatus::Ready;
            self.in_flight = None;
        }
        self.dirty = true;
    }

    fn passes_author_filter(&self, post: &PostRecord) -> bool {
        match (&self.thread_author, self.only_author) {
            (Some(author), true) => post.author_name == *author,
            _ => true,
        }
    }
}

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use forum_core::{
    update, Freshness, Msg, PostRecord, ReaderState, ReaderStatus, ReaderView, RequestKind,
    ThreadSummary,
};
use forum_logging::{forum_info, forum_warn};
use serde::Serialize;

use crate::effects::EffectRunner;

/// How many pages to read before stopping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    Pages(u32),
    All,
}

impl PageLimit {
    fn reached(&self, loaded: u32) -> bool {
        match self {
            PageLimit::Pages(max) => loaded >= (*max).max(1),
            PageLimit::All => false,
        }
    }
}

/// Drives the reader state machine until the page limit or the end of the feed.
pub struct Reader {
    state: ReaderState,
    runner: EffectRunner,
    timeout: Duration,
}

impl Reader {
    pub fn new(runner: EffectRunner, timeout: Duration) -> Self {
        Self {
            state: ReaderState::new(),
            runner,
            timeout,
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.run(effects);
    }

    pub fn read(mut self, feed: RequestKind, limit: PageLimit, only_author: bool) -> Result<ReaderView> {
        if only_author {
            self.dispatch(Msg::ToggleOnlyAuthor);
        }
        self.dispatch(Msg::Open(feed));

        let mut loaded = 0u32;
        loop {
            let msg = self
                .runner
                .next_msg(self.timeout)
                .ok_or_else(|| anyhow!("no answer from the engine within {:?}", self.timeout))?;
            let final_delivery = matches!(
                &msg,
                Msg::PageLoaded { freshness, .. } if freshness.is_final()
            );
            self.dispatch(msg);

            match self.state.status() {
                ReaderStatus::Ready if final_delivery => {
                    loaded += 1;
                    if limit.reached(loaded) || !self.state.has_more() {
                        break;
                    }
                    self.dispatch(Msg::LoadNextPage);
                }
                ReaderStatus::Blocked(_) | ReaderStatus::Failed => {
                    let reason = self
                        .state
                        .view()
                        .last_error
                        .unwrap_or_else(|| "unknown error".to_string());
                    if loaded == 0 {
                        bail!("{reason}");
                    }
                    forum_warn!("stopping after {loaded} page(s): {reason}");
                    break;
                }
                _ => {}
            }
        }

        forum_info!("read {loaded} page(s)");
        Ok(self.state.view())
    }
}

/// What the tool prints.
#[derive(Debug, Serialize)]
pub struct Report {
    pub kind: &'static str,
    pub id: String,
    pub fetched_at: String,
    pub current_page: u32,
    pub last_page: u32,
    pub has_more: bool,
    pub freshness: Option<Freshness>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub threads: Vec<ThreadSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<PostRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_author: Option<String>,
    pub only_author: bool,
}

impl Report {
    pub fn from_view(view: ReaderView) -> Self {
        let (kind, id) = match &view.feed {
            Some(RequestKind::Listing { forum_id }) => ("listing", forum_id.clone()),
            Some(RequestKind::Thread { thread_id, .. }) => ("thread", thread_id.clone()),
            None => ("none", String::new()),
        };
        Self {
            kind,
            id,
            fetched_at: Utc::now().to_rfc3339(),
            current_page: view.current_page,
            last_page: view.last_page,
            has_more: view.has_more,
            freshness: view.freshness,
            threads: view.threads,
            posts: view.posts,
            thread_author: view.thread_author,
            only_author: view.only_author,
        }
    }
}

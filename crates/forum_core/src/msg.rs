use crate::{Freshness, ObstacleKind, PageData, PageRequest, RequestKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Start reading a listing or a thread from its first page.
    Open(RequestKind),
    /// Drop everything loaded so far and reload the first page.
    Refresh,
    /// Continue with the page after the highest loaded one.
    LoadNextPage,
    /// The engine delivered a page. May arrive twice for one request
    /// (stale copy first, fresh copy later).
    PageLoaded {
        request: PageRequest,
        page: PageData,
        freshness: Freshness,
    },
    /// The engine gave up on a request.
    LoadFailed {
        request: PageRequest,
        failure: LoadFailure,
    },
    /// Show only posts by the thread starter, or everything again.
    ToggleOnlyAuthor,
    /// Render tick; carries no state change.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    Obstacle(ObstacleKind),
    Error(String),
}

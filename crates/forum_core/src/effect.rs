use crate::{ObstacleKind, PageRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Retrieve one page.
    Fetch(PageRequest),
    /// The page is behind an anti-bot challenge the engine could not get past.
    RequestRenderFallback(PageRequest),
    /// The forum wants a logged-in session.
    RequestLogin { obstacle: ObstacleKind },
}

//! Forum core: canonical page model, request composition and the pure
//! paging-reader state machine.
mod effect;
mod model;
mod msg;
mod request;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use model::{
    ExtractMode, Freshness, ListingPage, ObstacleKind, PageData, PostRecord, ThreadPage,
    ThreadSummary, DEFAULT_QUICK_LIMIT,
};
pub use msg::{LoadFailure, Msg};
pub use request::{PageRequest, RequestKind, SiteConfig, DEFAULT_FORUM_BASE};
pub use state::{ReaderState, ReaderStatus};
pub use update::update;
pub use view_model::ReaderView;

//! Forum engine: decoding, obstacle detection, resilient fetching, extraction,
//! caching and the background engine that ties them together.
mod cache;
mod classify;
mod client;
mod decode;
mod engine;
mod excerpt;
pub mod extract;
mod fetch;
mod render;
mod session;
mod settings;
mod snapshot;
mod transport;
mod types;

pub use cache::{
    CacheEntry, CacheSettings, CacheStats, Clock, ForumCaches, ManualClock, StalenessCache,
    SystemClock,
};
pub use classify::{classify, Classifier, Signature, SignatureRule};
pub use client::{Delivery, DiagnosticsSnapshot, ForumClient, ForumClientBuilder};
pub use decode::{
    decode, CharsetSource, DecodeSettings, DecodedDocument, FallbackEncoding,
    DEFAULT_META_SCAN_LIMIT,
};
pub use engine::{EngineEvent, EngineHandle, RequestId};
pub use excerpt::{excerpt, DEFAULT_EXCERPT_LEN};
pub use extract::{trim_thread_html, ExtractSettings, ForumExtractor, ParseError};
pub use fetch::{FetchSettings, ResilientFetcher, DEFAULT_ACCEPT_LANGUAGE, DESKTOP_USER_AGENT};
pub use render::{
    CommandRenderer, RenderError, RenderFetcher, RenderGate, RenderSettings, RenderedPage,
    DEFAULT_RENDER_SLOTS,
};
pub use session::{NoSession, SessionStore, StaticSession};
pub use settings::EngineSettings;
pub use snapshot::{snapshot_filename, SnapshotError, SnapshotWriter};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportRequest, TransportSettings};
pub use types::{
    EngineError, FailureKind, FetchFailure, FetchOutcome, FetchedDocument, RetrievalError,
};

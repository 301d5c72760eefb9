use std::path::PathBuf;

use forum_core::SiteConfig;

use crate::cache::CacheSettings;
use crate::decode::DecodeSettings;
use crate::extract::ExtractSettings;
use crate::fetch::FetchSettings;
use crate::render::RenderSettings;
use crate::transport::TransportSettings;

/// Everything the engine can be tuned with. `Default` targets the public forum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub site: SiteConfig,
    pub transport: TransportSettings,
    pub fetch: FetchSettings,
    pub decode: DecodeSettings,
    pub extract: ExtractSettings,
    pub cache: CacheSettings,
    pub render: RenderSettings,
    /// Fixed `Cookie` header for a logged-in session.
    pub cookie: Option<String>,
    /// Where pages that fail to parse are saved; `None` disables snapshots.
    pub snapshot_dir: Option<PathBuf>,
}

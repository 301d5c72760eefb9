use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use forum_core::SiteConfig;
use forum_engine::{EngineSettings, FallbackEncoding};
use forum_logging::{forum_info, forum_warn};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "forum.ron";

/// On-disk settings. Every field is optional; anything left out keeps the
/// engine default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub base_url: Option<String>,
    pub cookie: Option<String>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub redirect_limit: Option<usize>,
    pub max_bytes: Option<u64>,
    /// An encoding label such as `"gbk"`, or `"sniff"` for detection.
    pub fallback_encoding: Option<String>,
    pub quick_limit: Option<usize>,
    pub trim_threshold: Option<usize>,
    pub min_listing_rows: Option<usize>,
    pub listing_cache_secs: Option<u64>,
    pub thread_cache_secs: Option<u64>,
    pub raw_cache_secs: Option<u64>,
    pub render_command: Option<Vec<String>>,
    pub render_slots: Option<usize>,
    pub render_on_auth: Option<bool>,
    pub render_timeout_secs: Option<u64>,
    pub snapshot_dir: Option<PathBuf>,
}

/// Reads the config file. A missing file is only an error when the path was
/// given explicitly.
pub fn load_config(path: &Path, explicit: bool) -> Result<AppConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
            forum_info!("no config at {:?}; using defaults", path);
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config {}", path.display()))
        }
    };
    let config = ron::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    forum_info!("loaded config from {:?}", path);
    Ok(config)
}

impl AppConfig {
    pub fn into_settings(self) -> Result<EngineSettings> {
        let mut settings = EngineSettings::default();

        if let Some(base) = &self.base_url {
            settings.site =
                SiteConfig::new(base).with_context(|| format!("invalid base_url {base:?}"))?;
        }
        settings.cookie = self.cookie.filter(|cookie| !cookie.trim().is_empty());

        let fetch = &mut settings.fetch;
        if let Some(user_agent) = self.user_agent {
            fetch.user_agent = user_agent;
        }
        if let Some(accept_language) = self.accept_language {
            fetch.accept_language = accept_language;
        }
        if let Some(retries) = self.max_retries {
            fetch.max_retries = retries;
        }
        if let Some(ms) = self.initial_backoff_ms {
            fetch.initial_backoff = Duration::from_millis(ms);
        }

        let transport = &mut settings.transport;
        if let Some(secs) = self.connect_timeout_secs {
            transport.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.read_timeout_secs {
            transport.read_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = self.redirect_limit {
            transport.redirect_limit = limit;
        }
        if let Some(max_bytes) = self.max_bytes {
            transport.max_bytes = max_bytes;
        }

        if let Some(label) = &self.fallback_encoding {
            settings.decode.fallback = fallback_encoding(label)?;
        }

        let extract = &mut settings.extract;
        if let Some(limit) = self.quick_limit {
            extract.quick_limit = limit.max(1);
        }
        if let Some(threshold) = self.trim_threshold {
            extract.trim_threshold = threshold;
        }
        if let Some(rows) = self.min_listing_rows {
            extract.min_listing_rows = rows;
        }

        let cache = &mut settings.cache;
        if let Some(secs) = self.listing_cache_secs {
            cache.listing_window = Duration::from_secs(secs);
        }
        if let Some(secs) = self.thread_cache_secs {
            cache.thread_window = Duration::from_secs(secs);
        }
        if let Some(secs) = self.raw_cache_secs {
            cache.raw_window = Duration::from_secs(secs);
        }

        let render = &mut settings.render;
        if let Some(command) = self.render_command {
            if command.is_empty() {
                forum_warn!("render_command is empty; render fallback stays off");
            } else {
                render.command = Some(command);
            }
        }
        if let Some(slots) = self.render_slots {
            render.slots = slots.max(1);
        }
        if let Some(on_auth) = self.render_on_auth {
            render.render_on_auth = on_auth;
        }
        if let Some(secs) = self.render_timeout_secs {
            render.timeout = Duration::from_secs(secs);
        }

        settings.snapshot_dir = self.snapshot_dir;
        Ok(settings)
    }
}

fn fallback_encoding(label: &str) -> Result<FallbackEncoding> {
    if label.trim().eq_ignore_ascii_case("sniff") {
        return Ok(FallbackEncoding::Sniff);
    }
    match encoding_rs::Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) if encoding != encoding_rs::REPLACEMENT => {
            Ok(FallbackEncoding::Fixed(encoding))
        }
        _ => bail!("unsupported fallback_encoding {label:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_keeps_engine_defaults() {
        let config: AppConfig = ron::from_str("()").unwrap();
        assert_eq!(config.into_settings().unwrap(), EngineSettings::default());
    }

    #[test]
    fn fields_override_defaults() {
        let config: AppConfig = ron::from_str(
            r#"(
                base_url: Some("http://mirror.test/bbs"),
                cookie: Some("cdb_auth=abc"),
                max_retries: Some(0),
                fallback_encoding: Some("big5"),
                quick_limit: Some(5),
                listing_cache_secs: Some(10),
                render_command: Some(["node", "render.js"]),
                render_on_auth: Some(true),
            )"#,
        )
        .unwrap();

        let settings = config.into_settings().unwrap();

        assert_eq!(settings.site.base_url().as_str(), "http://mirror.test/bbs/");
        assert_eq!(settings.cookie.as_deref(), Some("cdb_auth=abc"));
        assert_eq!(settings.fetch.max_retries, 0);
        assert_eq!(
            settings.decode.fallback,
            FallbackEncoding::Fixed(encoding_rs::BIG5)
        );
        assert_eq!(settings.extract.quick_limit, 5);
        assert_eq!(settings.cache.listing_window, Duration::from_secs(10));
        assert_eq!(
            settings.render.command,
            Some(vec!["node".to_string(), "render.js".to_string()])
        );
        assert!(settings.render.render_on_auth);
    }

    #[test]
    fn sniff_is_accepted_and_nonsense_is_not() {
        assert_eq!(fallback_encoding("Sniff").unwrap(), FallbackEncoding::Sniff);
        assert!(fallback_encoding("klingon").is_err());
    }

    #[test]
    fn bad_base_url_is_reported() {
        let config = AppConfig {
            base_url: Some("not a url".to_string()),
            ..AppConfig::default()
        };
        assert!(config.into_settings().is_err());
    }

    #[test]
    fn missing_default_file_is_fine_but_explicit_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.ron");

        assert_eq!(load_config(&path, false).unwrap(), AppConfig::default());
        assert!(load_config(&path, true).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forum.ron");
        fs::write(&path, "(base_uri: Some(\"http://x.test/\"))").unwrap();

        assert!(load_config(&path, true).is_err());
    }
}

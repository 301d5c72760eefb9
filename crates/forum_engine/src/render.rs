use std::sync::Arc;
use std::time::Duration;

use forum_logging::{forum_debug, forum_info, forum_warn, LOG_BODY_LIMIT};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::excerpt::excerpt;

pub const DEFAULT_RENDER_SLOTS: usize = 2;

/// DOM produced by a headless browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub document: String,
    pub final_url: String,
    pub http_status: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("invalid render url: {0}")]
    InvalidUrl(String),
    #[error("failed to launch renderer: {0}")]
    Launch(String),
    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),
    #[error("renderer failed: {0}")]
    Failed(String),
    #[error("renderer unavailable")]
    Closed,
}

/// Out-of-process fallback for pages a plain HTTP client cannot get past.
#[async_trait::async_trait]
pub trait RenderFetcher: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Concurrent render sessions; further requests queue.
    pub slots: usize,
    /// Also try the renderer when a page asks for a login.
    pub render_on_auth: bool,
    /// Program and leading arguments; the URL is appended. `None` disables rendering.
    pub command: Option<Vec<String>>,
    pub timeout: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            slots: DEFAULT_RENDER_SLOTS,
            render_on_auth: false,
            command: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Limits how many render sessions run at once.
pub struct RenderGate {
    renderer: Arc<dyn RenderFetcher>,
    slots: Semaphore,
}

impl RenderGate {
    pub fn new(renderer: Arc<dyn RenderFetcher>, slots: usize) -> Self {
        Self {
            renderer,
            slots: Semaphore::new(slots.max(1)),
        }
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        if self.slots.available_permits() == 0 {
            forum_debug!("waiting for a render slot for {url}");
        }
        let _permit = self.slots.acquire().await.map_err(|_| RenderError::Closed)?;
        forum_info!("rendering {url}");
        self.renderer.render(url).await
    }
}

/// Runs an external command with the URL appended and reads the DOM from stdout.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// From a `[program, args...]` list; `None` when the list is empty.
    pub fn from_command(command: &[String], timeout: Duration) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec(), timeout))
    }
}

#[async_trait::async_trait]
impl RenderFetcher for CommandRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let parsed = url::Url::parse(url).map_err(|err| RenderError::InvalidUrl(err.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RenderError::InvalidUrl(format!(
                "only http and https can be rendered, got {}",
                parsed.scheme()
            )));
        }

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.program)
                .args(&self.args)
                .arg(url)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| RenderError::Timeout(self.timeout))?
        .map_err(|err| RenderError::Launch(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            forum_warn!("renderer exited with {} for {url}", output.status);
            return Err(RenderError::Failed(format!(
                "{}: {}",
                output.status,
                excerpt(&stderr, LOG_BODY_LIMIT)
            )));
        }
        if output.stdout.is_empty() {
            return Err(RenderError::Failed("empty DOM".to_string()));
        }

        Ok(RenderedPage {
            document: String::from_utf8_lossy(&output.stdout).into_owned(),
            final_url: url.to_string(),
            http_status: None,
        })
    }
}

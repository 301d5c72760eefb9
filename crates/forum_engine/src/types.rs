use std::fmt;

use forum_core::ObstacleKind;
use thiserror::Error;

use crate::decode::DecodedDocument;
use crate::extract::ParseError;

/// Result of one resilient fetch. Produced once, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(FetchedDocument),
    ObstacleDetected {
        kind: ObstacleKind,
        detail: FetchFailure,
    },
    /// Retries exhausted on network errors, timeouts, 5xx or empty bodies.
    TransientError(FetchFailure),
    /// A non-success status that retrying will not fix.
    ClientError(FetchFailure),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub document: DecodedDocument,
}

/// What went wrong, with enough context to diagnose without the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub url: String,
    pub status: Option<u16>,
    pub kind: FailureKind,
    pub message: String,
    /// Bounded prefix of the decoded body, if any was received.
    pub excerpt: Option<String>,
}

impl FetchFailure {
    pub(crate) fn new(url: &str, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            kind,
            message: message.into(),
            excerpt: None,
        }
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn with_excerpt(mut self, excerpt: Option<String>) -> Self {
        self.excerpt = excerpt;
        self
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind, self.url)?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    EmptyBody,
    Network,
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::Network | FailureKind::EmptyBody => true,
            FailureKind::HttpStatus(code) => (500..600).contains(code),
            FailureKind::InvalidUrl
            | FailureKind::RedirectLimitExceeded
            | FailureKind::TooLarge { .. } => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::EmptyBody => write!(f, "empty body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Failure of a consumer-level retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("{kind} at {url}")]
    Obstacle { kind: ObstacleKind, url: String },
    #[error("transient failure: {0}")]
    Transient(FetchFailure),
    #[error("request failed: {0}")]
    Http(FetchFailure),
    #[error("{source} ({url})")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
    #[error("render fallback failed for {url}: {message}")]
    Render { url: String, message: String },
    #[error("cancelled")]
    Cancelled,
}

impl RetrievalError {
    pub fn obstacle(&self) -> Option<ObstacleKind> {
        match self {
            RetrievalError::Obstacle { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Failure to set up the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

use std::sync::Arc;
use std::time::Duration;

use forum_logging::{bounded, forum_debug, forum_info, forum_trace, forum_warn, LOG_BODY_LIMIT};

use crate::classify::Classifier;
use crate::decode::{decode, DecodeSettings};
use crate::excerpt::{non_empty_excerpt, DEFAULT_EXCERPT_LEN};
use crate::session::SessionStore;
use crate::transport::{RawResponse, Transport, TransportRequest};
use crate::{FailureKind, FetchFailure, FetchOutcome, FetchedDocument};

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub user_agent: String,
    pub accept_language: String,
    /// Attempts after the first one, for transient failures only.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further one.
    pub initial_backoff: Duration,
    pub excerpt_len: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DESKTOP_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            excerpt_len: DEFAULT_EXCERPT_LEN,
        }
    }
}

enum Attempt {
    Done(FetchOutcome),
    Retry(FetchFailure),
}

/// HTTP retrieval with bounded retries, charset decoding and obstacle detection.
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionStore>,
    classifier: Classifier,
    decode: DecodeSettings,
    settings: FetchSettings,
}

impl ResilientFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionStore>,
        classifier: Classifier,
        decode: DecodeSettings,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            session,
            classifier,
            decode,
            settings,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let request = self.build_request(url);
        let mut backoff = self.settings.initial_backoff;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            forum_debug!("fetch attempt {attempt} for {url}");
            let failure = match self.attempt(&request).await {
                Attempt::Done(outcome) => return outcome,
                Attempt::Retry(failure) => failure,
            };

            if attempt > self.settings.max_retries {
                forum_warn!("giving up on {url} after {attempt} attempts: {failure}");
                return FetchOutcome::TransientError(failure);
            }
            forum_warn!("transient failure on attempt {attempt} ({failure}); retrying in {backoff:?}");
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
        }
    }

    fn build_request(&self, url: &str) -> TransportRequest {
        let mut headers = vec![
            ("User-Agent".to_string(), self.settings.user_agent.clone()),
            (
                "Accept-Language".to_string(),
                self.settings.accept_language.clone(),
            ),
        ];
        if let Some(cookie) = self.session.cookie_header() {
            headers.push(("Cookie".to_string(), cookie));
        }
        TransportRequest {
            url: url.to_string(),
            headers,
        }
    }

    async fn attempt(&self, request: &TransportRequest) -> Attempt {
        match self.transport.get(request).await {
            Ok(raw) => self.evaluate(&request.url, raw),
            Err(failure) if failure.kind.is_transient() => Attempt::Retry(failure),
            Err(failure) => Attempt::Done(FetchOutcome::ClientError(failure)),
        }
    }

    fn evaluate(&self, url: &str, raw: RawResponse) -> Attempt {
        let status = raw.status;
        let document = decode(&raw.body, raw.content_type.as_deref(), &self.decode);
        let excerpt = non_empty_excerpt(&document.text, self.settings.excerpt_len);

        // Challenge pages are often served with 403 or 503.
        if !document.text.trim().is_empty() {
            if let Some(kind) = self.classifier.classify(&document.text) {
                forum_info!("{kind} detected at {url} (status {status})");
                forum_trace!("{url} body: {}", bounded(&document.text, LOG_BODY_LIMIT));
                let detail = FetchFailure::new(url, FailureKind::HttpStatus(status), kind.to_string())
                    .with_status(status)
                    .with_excerpt(excerpt);
                return Attempt::Done(FetchOutcome::ObstacleDetected { kind, detail });
            }
        }

        if !(200..300).contains(&status) {
            let failure = FetchFailure::new(url, FailureKind::HttpStatus(status), "")
                .with_status(status)
                .with_excerpt(excerpt);
            return if failure.kind.is_transient() {
                Attempt::Retry(failure)
            } else {
                Attempt::Done(FetchOutcome::ClientError(failure))
            };
        }

        if document.text.trim().is_empty() {
            return Attempt::Retry(
                FetchFailure::new(url, FailureKind::EmptyBody, "").with_status(status),
            );
        }

        if document.had_replacements {
            forum_debug!("{url} decoded as {} with replacement characters", document.charset());
        }

        Attempt::Done(FetchOutcome::Success(FetchedDocument {
            url: url.to_string(),
            final_url: raw.final_url,
            status,
            document,
        }))
    }
}

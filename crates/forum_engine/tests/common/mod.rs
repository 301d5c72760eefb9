#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use bytes::Bytes;
use forum_engine::{
    FailureKind, FetchFailure, FetchSettings, RawResponse, RenderError, RenderFetcher,
    RenderedPage, Transport, TransportRequest,
};

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(forum_logging::initialize_for_tests);
}

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("missing fixture {}: {err}", path.display()))
}

/// Fetch settings that keep retry tests fast.
pub fn quick_retries() -> FetchSettings {
    FetchSettings {
        initial_backoff: Duration::from_millis(1),
        ..FetchSettings::default()
    }
}

pub type Reply = Result<RawResponse, FetchFailure>;

pub fn html(status: u16, body: &str) -> Reply {
    Ok(RawResponse {
        status,
        final_url: String::new(),
        content_type: Some("text/html; charset=utf-8".to_string()),
        body: Bytes::from(body.to_string()),
    })
}

pub fn network_down() -> Reply {
    Err(FetchFailure {
        url: String::new(),
        status: None,
        kind: FailureKind::Network,
        message: "connection refused".to_string(),
        excerpt: None,
    })
}

/// Replays canned replies in order; the last one repeats once the rest are used up.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<TransportRequest>>,
    called_at: Mutex<Vec<tokio::time::Instant>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        assert!(!replies.is_empty(), "scripted transport needs a reply");
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            called_at: Mutex::new(Vec::new()),
        })
    }

    /// Gaps between consecutive calls, on the tokio clock.
    pub fn gaps(&self) -> Vec<Duration> {
        let called_at = self.called_at.lock().unwrap();
        called_at
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Swap the script, e.g. to make the next fetch see a changed page.
    pub fn replace(&self, replies: Vec<Reply>) {
        *self.replies.lock().unwrap() = replies.into();
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, request: &TransportRequest) -> Result<RawResponse, FetchFailure> {
        self.requests.lock().unwrap().push(request.clone());
        self.called_at.lock().unwrap().push(tokio::time::Instant::now());
        let mut replies = self.replies.lock().unwrap();
        let reply = if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        };
        reply
            .map(|mut raw| {
                if raw.final_url.is_empty() {
                    raw.final_url = request.url.clone();
                }
                raw
            })
            .map_err(|mut failure| {
                failure.url = request.url.clone();
                failure
            })
    }
}

/// Returns a fixed DOM for every URL and counts the renders.
pub struct FakeRenderer {
    document: String,
    renders: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn new(document: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            document: document.into(),
            renders: Mutex::new(Vec::new()),
        })
    }

    pub fn rendered(&self) -> Vec<String> {
        self.renders.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RenderFetcher for FakeRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        self.renders.lock().unwrap().push(url.to_string());
        Ok(RenderedPage {
            document: self.document.clone(),
            final_url: url.to_string(),
            http_status: Some(200),
        })
    }
}

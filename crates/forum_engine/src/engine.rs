use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use forum_core::{Freshness, PageData, PageRequest};
use forum_logging::forum_debug;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::{EngineError, EngineSettings, ForumClient, RetrievalError};

pub type RequestId = u64;

enum EngineCommand {
    Enqueue {
        request_id: RequestId,
        request: PageRequest,
    },
    Cancel {
        request_id: RequestId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A page for the request; a `Stale` delivery is followed by another event.
    Delivered {
        request_id: RequestId,
        request: PageRequest,
        page: PageData,
        freshness: Freshness,
    },
    Failed {
        request_id: RequestId,
        request: PageRequest,
        error: RetrievalError,
    },
    Cancelled {
        request_id: RequestId,
    },
}

impl EngineEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            EngineEvent::Delivered { request_id, .. }
            | EngineEvent::Failed { request_id, .. }
            | EngineEvent::Cancelled { request_id } => *request_id,
        }
    }

    /// Whether no further events follow for this request.
    pub fn is_final(&self) -> bool {
        match self {
            EngineEvent::Delivered { freshness, .. } => freshness.is_final(),
            EngineEvent::Failed { .. } | EngineEvent::Cancelled { .. } => true,
        }
    }
}

type Tokens = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

/// Runs retrievals on a background runtime and reports them over a channel.
///
/// Suited to synchronous callers such as a UI loop: `enqueue` returns at once
/// and results are polled with `try_recv` or `recv_timeout`.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    next_id: AtomicU64,
    client: ForumClient,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineError> {
        Self::with_client(ForumClient::new(settings)?)
    }

    pub fn with_client(client: ForumClient) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("forum-engine")
            .build()?;

        let worker_client = client.clone();
        thread::spawn(move || {
            let tokens: Tokens = Arc::default();
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Enqueue {
                        request_id,
                        request,
                    } => {
                        let token = CancellationToken::new();
                        lock(&tokens).insert(request_id, token.clone());
                        runtime.spawn(run_request(
                            worker_client.clone(),
                            request_id,
                            request,
                            token,
                            event_tx.clone(),
                            tokens.clone(),
                        ));
                    }
                    EngineCommand::Cancel { request_id } => {
                        if let Some(token) = lock(&tokens).remove(&request_id) {
                            token.cancel();
                        }
                    }
                }
            }
            forum_debug!("engine command channel closed; shutting down");
        });

        Ok(Self {
            cmd_tx,
            event_rx,
            next_id: AtomicU64::new(1),
            client,
        })
    }

    pub fn client(&self) -> &ForumClient {
        &self.client
    }

    pub fn enqueue(&self, request: PageRequest) -> RequestId {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = self.cmd_tx.send(EngineCommand::Enqueue {
            request_id,
            request,
        });
        request_id
    }

    /// Drops the in-flight work for `request_id`; a `Cancelled` event follows
    /// unless the request already finished.
    pub fn cancel(&self, request_id: RequestId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { request_id });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

fn lock(tokens: &Tokens) -> std::sync::MutexGuard<'_, HashMap<RequestId, CancellationToken>> {
    tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_request(
    client: ForumClient,
    request_id: RequestId,
    request: PageRequest,
    token: CancellationToken,
    event_tx: mpsc::Sender<EngineEvent>,
    tokens: Tokens,
) {
    let deliveries = async {
        let mut stream = client.watch_page(request.clone());
        while let Some(result) = stream.next().await {
            let event = match result {
                Ok((page, freshness)) => EngineEvent::Delivered {
                    request_id,
                    request: request.clone(),
                    page,
                    freshness,
                },
                Err(error) => EngineEvent::Failed {
                    request_id,
                    request: request.clone(),
                    error,
                },
            };
            if token.is_cancelled() {
                return;
            }
            let _ = event_tx.send(event);
        }
    };

    tokio::select! {
        _ = token.cancelled() => {
            forum_debug!("request {request_id} cancelled");
            let _ = event_tx.send(EngineEvent::Cancelled { request_id });
        }
        _ = deliveries => {}
    }
    lock(&tokens).remove(&request_id);
}

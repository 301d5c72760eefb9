use std::time::Duration;

use forum_core::{Effect, LoadFailure, Msg, ObstacleKind};
use forum_engine::{EngineEvent, EngineHandle};
use forum_logging::{forum_debug, forum_info, forum_warn};

/// Carries reader effects to the engine and engine events back as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Fetch(request) => {
                    let id = self.engine.enqueue(request.clone());
                    forum_debug!("enqueued request {id}: {request:?}");
                }
                Effect::RequestRenderFallback(request) => {
                    forum_warn!(
                        "page {} is behind an anti-bot challenge; set render_command in the config to render it",
                        request.page
                    );
                }
                Effect::RequestLogin { obstacle } => {
                    forum_warn!(
                        "{obstacle}: log in at {} and set FORUM_COOKIE or `cookie` in the config",
                        self.engine.client().site().login_url()
                    );
                }
            }
        }
    }

    /// Next engine event as a reader message, waiting up to `timeout`.
    pub fn next_msg(&self, timeout: Duration) -> Option<Msg> {
        loop {
            let event = self.engine.recv_timeout(timeout)?;
            if let Some(msg) = event_to_msg(event) {
                return Some(msg);
            }
        }
    }
}

pub fn event_to_msg(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Delivered {
            request,
            page,
            freshness,
            ..
        } => Some(Msg::PageLoaded {
            request,
            page,
            freshness,
        }),
        EngineEvent::Failed { request, error, .. } => {
            let failure = match error.obstacle() {
                Some(kind) => LoadFailure::Obstacle(kind),
                None => LoadFailure::Error(error.to_string()),
            };
            if matches!(failure, LoadFailure::Obstacle(ObstacleKind::AntiBotChallenge)) {
                forum_info!("challenge persisted for page {}", request.page);
            }
            Some(Msg::LoadFailed { request, failure })
        }
        EngineEvent::Cancelled { request_id } => {
            forum_debug!("request {request_id} cancelled");
            None
        }
    }
}

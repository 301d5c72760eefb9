use crate::{
    Effect, LoadFailure, Msg, ObstacleKind, PageData, ReaderState, ReaderStatus, RequestKind,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ReaderState, msg: Msg) -> (ReaderState, Vec<Effect>) {
    let effects = match msg {
        Msg::Open(feed) => {
            let request = state.open(feed);
            vec![Effect::Fetch(request)]
        }
        Msg::Refresh => match state.feed().cloned() {
            Some(feed) => {
                let request = state.open(feed);
                vec![Effect::Fetch(request)]
            }
            None => Vec::new(),
        },
        Msg::LoadNextPage => {
            if state.status() == ReaderStatus::Loading || !state.has_more() {
                return (state, Vec::new());
            }
            match state.next_request() {
                Some(request) => {
                    state.begin(request.clone());
                    vec![Effect::Fetch(request)]
                }
                None => Vec::new(),
            }
        }
        Msg::PageLoaded {
            request,
            page,
            freshness,
        } => {
            if !state.is_current(&request) {
                return (state, Vec::new());
            }
            match (&request.kind, page) {
                (RequestKind::Listing { .. }, PageData::Listing(listing)) => {
                    state.apply_listing(listing, freshness);
                }
                (RequestKind::Thread { .. }, PageData::Thread(thread)) => {
                    state.apply_thread(thread, freshness);
                }
                // A page of the wrong shape for this feed carries nothing usable.
                _ => {}
            }
            Vec::new()
        }
        Msg::LoadFailed { request, failure } => {
            if !state.is_current(&request) {
                return (state, Vec::new());
            }
            match failure {
                LoadFailure::Obstacle(kind) => {
                    state.apply_failure(ReaderStatus::Blocked(kind), Some(kind.to_string()));
                    match kind {
                        ObstacleKind::AntiBotChallenge => {
                            vec![Effect::RequestRenderFallback(request)]
                        }
                        ObstacleKind::AuthenticationRequired => {
                            vec![Effect::RequestLogin { obstacle: kind }]
                        }
                        ObstacleKind::HumanVerificationRequired
                        | ObstacleKind::PermissionDenied => Vec::new(),
                    }
                }
                LoadFailure::Error(message) => {
                    state.apply_failure(ReaderStatus::Failed, Some(message));
                    Vec::new()
                }
            }
        }
        Msg::ToggleOnlyAuthor => {
            state.toggle_only_author();
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::transcript::TranscriptFetcher;

pub(crate) mod transcript;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) fetcher: Arc<dyn TranscriptFetcher>,
}

impl AppState {
    pub(crate) fn new(fetcher: impl TranscriptFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(transcript::handle_health_request))
        .route("/api/transcript", get(transcript::handle_transcript_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

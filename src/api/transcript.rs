use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::{error, info};

use crate::api::AppState;
use crate::bail_api;
use crate::error::{ApiError, ApiResult, HttpErrorResponse};
use crate::transcript::join_fragments;

pub(crate) const HEALTH_MESSAGE: &str = "Transcript Fetcher API is running.";
pub(crate) const MISSING_VIDEO_ID: &str = "Missing \"videoId\" query parameter.";
pub(crate) const FETCH_FAILED: &str = "Failed to retrieve transcript.";

#[derive(Deserialize, Debug)]
pub(crate) struct TranscriptRequest {
    #[serde(rename = "videoId")]
    pub(crate) video_id: Option<String>,
}

#[axum_macros::debug_handler]
pub(crate) async fn handle_health_request() -> &'static str {
    HEALTH_MESSAGE
}

#[axum_macros::debug_handler]
pub(crate) async fn handle_transcript_request(
    State(state): State<AppState>,
    request: Option<Query<TranscriptRequest>>,
) -> ApiResult<String> {
    // An unparsable query string counts as a missing id
    let video_id = match request.and_then(|Query(request)| request.video_id) {
        Some(video_id) if !video_id.is_empty() => video_id,
        _ => bail_api!(StatusCode::BAD_REQUEST, MISSING_VIDEO_ID),
    };

    info!("Fetching transcript for video ID: {}", video_id);
    match state.fetcher.fetch_transcript(&video_id).await {
        Ok(fragments) => {
            let transcript = join_fragments(&fragments);
            info!(
                "Successfully fetched transcript for {}. Length: {}",
                video_id,
                transcript.chars().count()
            );
            Ok(transcript)
        }
        Err(err) => {
            error!("Failed to fetch transcript for {}: {}", video_id, err);
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: HttpErrorResponse::from(FETCH_FAILED).with_message(err.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    use crate::api::{router, AppState};
    use crate::transcript::{FetchError, TranscriptFetcher, TranscriptFragment};

    use super::*;

    enum Outcome {
        Fragments(Vec<&'static str>),
        Disabled,
    }

    struct MockFetcher {
        outcome: Outcome,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TranscriptFetcher for MockFetcher {
        async fn fetch_transcript(
            &self,
            video_id: &str,
        ) -> Result<Vec<TranscriptFragment>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.outcome {
                Outcome::Fragments(texts) => Ok(texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| TranscriptFragment {
                        text: text.to_string(),
                        start: i as f64,
                        duration: 1.0,
                    })
                    .collect()),
                Outcome::Disabled => Err(FetchError::TranscriptDisabled(video_id.to_string())),
            }
        }
    }

    fn app(outcome: Outcome) -> (axum::Router, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = MockFetcher {
            outcome,
            calls: calls.clone(),
        };
        (router(AppState::new(fetcher)), calls)
    }

    async fn get(app: axum::Router, uri: &str) -> Response {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app.oneshot(req).await.unwrap()
    }

    async fn body_string(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn content_type(res: &Response) -> &str {
        res.headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn health_check_reports_running() {
        let (app, calls) = app(Outcome::Disabled);
        let res = get(app, "/").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(content_type(&res).starts_with("text/plain"));
        assert_eq!(body_string(res).await, HEALTH_MESSAGE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_video_id_is_rejected_without_fetching() {
        for uri in [
            "/api/transcript",
            "/api/transcript?videoId=",
            "/api/transcript?other=1",
            // Repeated ids fail to deserialize and are answered like a missing one
            "/api/transcript?videoId=a&videoId=b",
        ] {
            let (app, calls) = app(Outcome::Fragments(vec!["unused"]));
            let res = get(app, uri).await;
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(content_type(&res).starts_with("application/json"));
            assert_eq!(
                body_string(res).await,
                r#"{"error":"Missing \"videoId\" query parameter."}"#
            );
            assert_eq!(calls.load(Ordering::SeqCst), 0, "{uri}");
        }
    }

    #[tokio::test]
    async fn fragments_are_joined_with_spaces() {
        let (app, calls) = app(Outcome::Fragments(vec!["Hello", "world"]));
        let res = get(app, "/api/transcript?videoId=dQw4w9WgXcQ").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(content_type(&res).starts_with("text/plain"));
        assert_eq!(body_string(res).await, "Hello world");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_transcript_is_still_ok() {
        let (app, _) = app(Outcome::Fragments(vec![]));
        let res = get(app, "/api/transcript?videoId=dQw4w9WgXcQ").await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_string(res).await, "");
    }

    #[tokio::test]
    async fn fetch_failures_forward_the_message() {
        let (app, calls) = app(Outcome::Disabled);
        let res = get(app, "/api/transcript?videoId=abc").await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "Failed to retrieve transcript.",
                "message": "Transcript is disabled on this video (abc)"
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn any_non_empty_id_is_passed_verbatim() {
        let (app, _) = app(Outcome::Disabled);
        let res = get(app, "/api/transcript?videoId=not%20an%20id").await;
        let body: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(
            body["message"],
            "Transcript is disabled on this video (not an id)"
        );
    }

    #[tokio::test]
    async fn repeated_requests_get_identical_responses() {
        let (app, calls) = app(Outcome::Fragments(vec!["same", "text"]));
        let first = get(app.clone(), "/api/transcript?videoId=dQw4w9WgXcQ").await;
        let second = get(app, "/api/transcript?videoId=dQw4w9WgXcQ").await;
        assert_eq!(first.status(), second.status());
        assert_eq!(body_string(first).await, body_string(second).await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let (app, _) = app(Outcome::Disabled);
        let res = get(app, "/api/other").await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

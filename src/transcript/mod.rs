use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod youtube;

/// One caption entry as emitted by the upstream caption track.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct TranscriptFragment {
    pub text: String,
    /// Offset from the start of the video, in seconds
    pub start: f64,
    /// In seconds
    pub duration: f64,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("YouTube is receiving too many requests from this IP and now requires solving a captcha to continue")]
    TooManyRequests,
    #[error("The video is no longer available ({0})")]
    VideoUnavailable(String),
    #[error("Transcript is disabled on this video ({0})")]
    TranscriptDisabled(String),
    #[error("No transcripts are available for this video ({0})")]
    NotAvailable(String),
    #[error("Impossible to retrieve Youtube video ID.")]
    InvalidVideoId,
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse caption data: {0}")]
    Malformed(String),
}

/// Source of caption fragments for a video.
///
/// Implementations must be stateless across calls: the same id and the same
/// upstream state always produce the same outcome.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptFragment>, FetchError>;
}

/// Flattens fragments into a single space separated text, keeping their order.
pub fn join_fragments(fragments: &[TranscriptFragment]) -> String {
    fragments
        .iter()
        .map(|fragment| fragment.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

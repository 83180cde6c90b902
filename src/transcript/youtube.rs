use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::transcript::{FetchError, TranscriptFetcher, TranscriptFragment};

lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(
        r#"(?i)(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#
    )
    .unwrap();
    static ref CAPTION_RE: Regex =
        Regex::new(r#"<text start="([^"]*)" dur="([^"]*)">([^<]*)</text>"#).unwrap();
    static ref ENTITY_RE: Regex = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap();
}

const VIDEO_ID_LENGTH: usize = 11;

/// Scrapes the caption track of a video from the YouTube watch page.
///
/// The first caption track listed by the player is used, no language selection is performed.
#[derive(Clone, Debug)]
pub struct YoutubeTranscriptFetcher {
    client: Client,
    base_url: Url,
}

impl YoutubeTranscriptFetcher {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        let base_url = Url::parse(base_url)?;
        Ok(Self { client, base_url })
    }

    fn watch_url(&self, video_id: &str) -> Result<Url, FetchError> {
        let mut url = self
            .base_url
            .join("watch")
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        url.query_pairs_mut().append_pair("v", video_id);
        Ok(url)
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeTranscriptFetcher {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<TranscriptFragment>, FetchError> {
        let id = retrieve_video_id(video_id)?;
        let page = self
            .client
            .get(self.watch_url(&id)?)
            .send()
            .await?
            .text()
            .await?;

        // Errors name the caller's input, which may be a url rather than the bare id
        let track_url = caption_track_url(&page, video_id)?;
        // Track urls are absolute in practice, joining only matters for relative ones
        let track_url = self
            .base_url
            .join(&track_url)
            .map_err(|e| FetchError::Malformed(e.to_string()))?;
        debug!("Requesting caption track {}", track_url);

        let response = self.client.get(track_url).send().await?;
        if !response.status().is_success() {
            debug!("Caption track responded with {}", response.status());
            return Err(FetchError::NotAvailable(video_id.to_string()));
        }
        let fragments = parse_caption_xml(&response.text().await?);
        debug!("Parsed {} caption fragments", fragments.len());
        Ok(fragments)
    }
}

/// Accepts either a bare 11 character id or any common YouTube url form.
pub fn retrieve_video_id(input: &str) -> Result<String, FetchError> {
    if input.chars().count() == VIDEO_ID_LENGTH {
        return Ok(input.to_string());
    }
    VIDEO_ID_RE
        .captures(input)
        .map(|captures| captures[1].to_string())
        .ok_or(FetchError::InvalidVideoId)
}

fn caption_track_url(page: &str, video_id: &str) -> Result<String, FetchError> {
    let Some((_, captions)) = page.split_once(r#""captions":"#) else {
        if page.contains(r#"class="g-recaptcha""#) {
            return Err(FetchError::TooManyRequests);
        }
        if !page.contains(r#""playabilityStatus":"#) {
            return Err(FetchError::VideoUnavailable(video_id.to_string()));
        }
        return Err(FetchError::TranscriptDisabled(video_id.to_string()));
    };

    let captions = captions
        .split(r#","videoDetails"#)
        .next()
        .unwrap_or_default()
        .replace('\n', "");
    let captions: Value =
        serde_json::from_str(&captions).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let Some(renderer) = captions.get("playerCaptionsTracklistRenderer") else {
        return Err(FetchError::TranscriptDisabled(video_id.to_string()));
    };
    let Some(track) = renderer
        .get("captionTracks")
        .and_then(Value::as_array)
        .and_then(|tracks| tracks.first())
    else {
        return Err(FetchError::NotAvailable(video_id.to_string()));
    };

    track
        .get("baseUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FetchError::Malformed("caption track has no baseUrl".to_string()))
}

fn parse_caption_xml(xml: &str) -> Vec<TranscriptFragment> {
    CAPTION_RE
        .captures_iter(xml)
        .map(|captures| TranscriptFragment {
            // Once for the XML layer, once for entities inside the caption text itself
            text: decode_entities(&decode_entities(&captures[3])),
            start: captures[1].parse().unwrap_or(0.0),
            duration: captures[2].parse().unwrap_or(0.0),
        })
        .collect()
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |captures: &Captures| {
            decode_entity(&captures[1])
                .map(String::from)
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let number = entity.strip_prefix('#')?;
            let code = match number.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => number.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::models::analysis::{Transcript, TranscriptSegment};

/// Resolve a YouTube URL to its video id.
///
/// Accepts `youtu.be/<id>`, `youtube.com/watch?v=<id>`, `youtube.com/embed/<id>`
/// and `youtube.com/v/<id>`. Returns `None` for anything else.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?;
    let mut segments = url.path_segments()?;

    let id = match host {
        "youtu.be" => segments.next()?.to_string(),
        "www.youtube.com" | "youtube.com" | "m.youtube.com" => match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())?,
            "embed" | "v" => segments.next()?.to_string(),
            _ => return None,
        },
        _ => return None,
    };

    (!id.is_empty()).then_some(id)
}

/// Source of transcripts for a video.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError>;
}

/// Fetches captions from YouTube's timed-text endpoint (`fmt=json3`).
pub struct YouTubeTranscripts {
    http: Client,
    base_url: String,
    language: String,
}

#[derive(Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimedTextEvent {
    #[serde(default)]
    t_start_ms: u64,
    #[serde(default)]
    d_duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Deserialize)]
struct TimedTextSeg {
    #[serde(default)]
    utf8: String,
}

impl YouTubeTranscripts {
    pub fn new(timeout: Duration) -> Result<Self, TranscriptError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: "https://www.youtube.com/api/timedtext".to_string(),
            language: "en".to_string(),
        })
    }
}

#[async_trait]
impl TranscriptSource for YouTubeTranscripts {
    async fn fetch(&self, video_id: &str) -> Result<Transcript, TranscriptError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[("v", video_id), ("lang", self.language.as_str()), ("fmt", "json3")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranscriptError::Unavailable(format!(
                "timed-text endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(TranscriptError::Unavailable(format!(
                "no captions published for {video_id}"
            )));
        }

        let timed: TimedText = serde_json::from_str(&body)?;
        let transcript = Transcript::from_segments(video_id, segments_from(timed));
        if transcript.segments.is_empty() {
            return Err(TranscriptError::Unavailable(format!(
                "caption track for {video_id} is empty"
            )));
        }
        Ok(transcript)
    }
}

fn segments_from(timed: TimedText) -> Vec<TranscriptSegment> {
    timed
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!text.is_empty()).then(|| TranscriptSegment {
                text,
                start: event.t_start_ms as f64 / 1000.0,
                duration: event.d_duration_ms as f64 / 1000.0,
            })
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("Transcript request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse transcript: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Transcript unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_link() {
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_watch_link() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch?feature=share&v=abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_embed_and_v_links() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(extract_video_id("https://www.youtube.com/v/abc123").as_deref(), Some("abc123"));
    }

    #[test]
    fn test_rejects_unresolvable_references() {
        assert_eq!(extract_video_id("not a url"), None);
        assert_eq!(extract_video_id("https://youtu.be/"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v="), None);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/channel/xyz"), None);
        assert_eq!(extract_video_id("https://vimeo.com/12345"), None);
    }

    #[test]
    fn test_segments_from_timed_text() {
        let timed: TimedText = serde_json::from_str(
            r#"{"events": [
                {"tStartMs": 0, "dDurationMs": 3500, "segs": [{"utf8": "Intro"}]},
                {"tStartMs": 3500, "dDurationMs": 100},
                {"tStartMs": 3500, "dDurationMs": 4200, "segs": [{"utf8": "Climate change "}, {"utf8": "is\nreal"}]}
            ]}"#,
        )
        .unwrap();

        let segments = segments_from(timed);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "Climate change is real");
        assert_eq!(segments[1].start, 3.5);
        assert_eq!(segments[1].duration, 4.2);
    }
}

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::MediaError;
use crate::provider::http;
use crate::provider::{MediaDetails, MetadataProvider, ProviderKind, TrackLength};
use crate::state::YoutubeConfig;

const VIDEOS_ENDPOINT: &str = "youtube/videos";

/// YouTube Data API v3 video lookups, authenticated with an API key.
pub struct YoutubeProvider {
    api_key: String,
    api_base: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct YoutubeVideoResponse {
    #[serde(default)]
    items: Vec<YoutubeVideo>,
}

#[derive(Deserialize)]
struct YoutubeVideo {
    snippet: YoutubeVideoSnippet,
    #[serde(rename = "contentDetails")]
    content_details: YoutubeVideoContentDetails,
    #[serde(default)]
    status: Option<YoutubeVideoStatus>,
}

#[derive(Deserialize)]
struct YoutubeVideoSnippet {
    title: String,
    #[serde(rename = "channelTitle")]
    channel_title: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Deserialize)]
struct YoutubeVideoContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Deserialize)]
struct YoutubeVideoStatus {
    #[serde(rename = "privacyStatus")]
    privacy_status: Option<String>,
}

impl Thumbnails {
    fn best(&self) -> Option<&str> {
        [
            &self.maxres,
            &self.standard,
            &self.high,
            &self.medium,
            &self.default,
        ]
        .into_iter()
        .flatten()
        .map(|thumb| thumb.url.as_str())
        .find(|url| !url.is_empty())
    }
}

pub fn fallback_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id)
}

/// Parse `PT#H#M#S` (any component optional, `P#D` folded in as 24h) into a
/// track length with hours folded into minutes. Unknown designators are
/// skipped.
pub fn parse_iso8601_duration(duration: &str) -> TrackLength {
    let mut total_secs = 0u64;
    let mut num = String::new();

    for ch in duration.trim_start_matches('P').chars() {
        if ch.is_ascii_digit() {
            num.push(ch);
            continue;
        }
        if let Ok(value) = num.parse::<u64>() {
            let unit = match ch {
                'D' => 86_400,
                'H' => 3600,
                'M' => 60,
                'S' => 1,
                _ => 0,
            };
            total_secs = total_secs.saturating_add(value.saturating_mul(unit));
        }
        num.clear();
    }

    TrackLength::from_total_seconds(total_secs)
}

impl YoutubeVideo {
    fn into_details(self, video_id: &str) -> MediaDetails {
        MediaDetails {
            thumbnail_url: self
                .snippet
                .thumbnails
                .best()
                .map(str::to_string)
                .unwrap_or_else(|| fallback_thumbnail(video_id)),
            artist: self
                .snippet
                .channel_title
                .filter(|channel| !channel.is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            duration: parse_iso8601_duration(&self.content_details.duration),
            preview_url: None,
            title: self.snippet.title,
        }
    }

    fn is_private(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|status| status.privacy_status.as_deref())
            == Some("private")
    }
}

impl YoutubeProvider {
    pub fn new(cfg: &YoutubeConfig, http: reqwest::Client) -> Self {
        Self {
            api_key: cfg.api_key.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl MetadataProvider for YoutubeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Youtube
    }

    async fn fetch_details(&self, id: &str) -> Result<MediaDetails, MediaError> {
        if self.api_key.is_empty() {
            return Err(MediaError::Auth("YOUTUBE_API_KEY is not set".to_string()));
        }

        let url = format!("{}/videos", self.api_base);
        let request = self.http.get(&url).query(&[
            ("id", id),
            ("part", "snippet,contentDetails,status"),
            ("key", self.api_key.as_str()),
        ]);

        let response = http::send(VIDEOS_ENDPOINT, http::accept_json(request)).await?;
        let resp: YoutubeVideoResponse = http::read_json(VIDEOS_ENDPOINT, response).await?;

        let video = resp
            .items
            .into_iter()
            .next()
            .filter(|video| !video.is_private())
            .ok_or_else(|| {
                MediaError::provider(404, VIDEOS_ENDPOINT, format!("video {} not available", id))
            })?;

        Ok(video.into_details(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testutil;
    use axum::{
        extract::Query,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[test]
    fn test_parse_iso8601_duration() {
        let cases = [
            ("PT3M42S", (3, 42)),
            ("PT1H2M3S", (62, 3)),
            ("PT45S", (0, 45)),
            ("PT4M", (4, 0)),
            ("PT2H", (120, 0)),
            ("P1DT1M", (1441, 0)),
            ("P0D", (0, 0)),
            ("", (0, 0)),
        ];
        for (input, (minutes, seconds)) in cases {
            assert_eq!(
                parse_iso8601_duration(input),
                TrackLength { minutes, seconds },
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_absurd_duration_saturates() {
        let length = parse_iso8601_duration("P999999999999999999DT99999999999999999999H1S");
        assert_eq!(length.minutes, u32::MAX);
    }

    #[test]
    fn test_thumbnail_priority() {
        let video: YoutubeVideo = serde_json::from_value(json!({
            "snippet": {
                "title": "t",
                "channelTitle": "c",
                "thumbnails": {
                    "default": {"url": "https://i.ytimg.com/default.jpg"},
                    "medium": {"url": "https://i.ytimg.com/medium.jpg"},
                    "high": {"url": "https://i.ytimg.com/high.jpg"}
                }
            },
            "contentDetails": {"duration": "PT1S"}
        }))
        .unwrap();
        assert_eq!(video.snippet.thumbnails.best(), Some("https://i.ytimg.com/high.jpg"));
    }

    #[test]
    fn test_thumbnail_fallback() {
        let video: YoutubeVideo = serde_json::from_value(json!({
            "snippet": {"title": "t", "thumbnails": {}},
            "contentDetails": {"duration": "PT1S"}
        }))
        .unwrap();
        let details = video.into_details("dQw4w9WgXcQ");

        assert_eq!(
            details.thumbnail_url,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg"
        );
        assert_eq!(details.artist, "Unknown");
        assert_eq!(details.preview_url, None);
    }

    async fn videos(Query(params): Query<HashMap<String, String>>) -> Response {
        if params.get("key").map(String::as_str) != Some("test-key") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "API key not valid"}})),
            )
                .into_response();
        }
        assert_eq!(
            params.get("part").map(String::as_str),
            Some("snippet,contentDetails,status")
        );

        let items: Value = match params.get("id").map(String::as_str) {
            Some("dQw4w9WgXcQ") => json!([{
                "snippet": {
                    "title": "Never Gonna Give You Up",
                    "channelTitle": "Rick Astley",
                    "thumbnails": {
                        "medium": {"url": "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg"}
                    }
                },
                "contentDetails": {"duration": "PT1H2M3S"},
                "status": {"privacyStatus": "public"}
            }]),
            Some("privateVid0") => json!([{
                "snippet": {"title": "hidden"},
                "contentDetails": {"duration": "PT1M"},
                "status": {"privacyStatus": "private"}
            }]),
            _ => json!([]),
        };
        Json(json!({"kind": "youtube#videoListResponse", "items": items})).into_response()
    }

    async fn fake_youtube(api_key: &str) -> YoutubeProvider {
        let base = testutil::serve(Router::new().route("/youtube/v3/videos", get(videos))).await;
        let cfg = YoutubeConfig {
            api_key: api_key.to_string(),
            api_base: format!("{}/youtube/v3", base),
        };
        YoutubeProvider::new(&cfg, testutil::client())
    }

    #[tokio::test]
    async fn test_fetch_details() {
        let youtube = fake_youtube("test-key").await;
        let details = youtube.fetch_details("dQw4w9WgXcQ").await.unwrap();

        assert_eq!(
            details,
            MediaDetails {
                title: "Never Gonna Give You Up".to_string(),
                artist: "Rick Astley".to_string(),
                thumbnail_url: "https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg".to_string(),
                duration: TrackLength { minutes: 62, seconds: 3 },
                preview_url: None,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_and_private_videos_are_not_found() {
        let youtube = fake_youtube("test-key").await;

        let err = youtube.fetch_details("xxxxxxxxxxx").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));

        let err = youtube.fetch_details("privateVid0").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }

    #[tokio::test]
    async fn test_bad_api_key_is_provider_error() {
        let youtube = fake_youtube("wrong").await;
        let err = youtube.fetch_details("dQw4w9WgXcQ").await.unwrap_err();
        assert_eq!(
            err,
            MediaError::provider(400, "youtube/videos", "API key not valid")
        );
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let app = Router::new().route(
            "/youtube/v3/videos",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Json(json!({"items": []}))
            }),
        );
        let base = testutil::serve(app).await;
        let cfg = YoutubeConfig {
            api_key: "test-key".to_string(),
            api_base: format!("{}/youtube/v3", base),
        };
        let youtube = YoutubeProvider::new(&cfg, testutil::client());

        let err = youtube.fetch_details("dQw4w9WgXcQ").await.unwrap_err();
        assert_eq!(
            err,
            MediaError::Timeout {
                endpoint: "youtube/videos".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let youtube = YoutubeProvider::new(&YoutubeConfig::default(), testutil::client());
        assert!(youtube.fetch_details("dQw4w9WgXcQ").await.unwrap_err().is_auth());
    }
}

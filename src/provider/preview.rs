//! Spotify preview fallback: scrape the public embed page when the Web API
//! leaves `preview_url` empty.
//!
//! The embed markup is unversioned and has already changed shape once, so
//! both known patterns are tried and a miss is logged separately from a
//! failed fetch. A miss on a page that did load is the signal that the markup
//! moved again.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::provider::http;
use crate::provider::PreviewSource;

const ENDPOINT: &str = "spotify/embed";

static AUDIO_PREVIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""audioPreview":\s*\{\s*"url":\s*"([^"]+)""#).expect("audioPreview pattern")
});

static PREVIEW_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""preview_url":\s*"([^"]+)""#).expect("preview_url pattern")
});

/// Which markup shape produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewPattern {
    AudioPreview,
    PreviewUrl,
}

/// Find a preview URL in embed page HTML, trying `audioPreview` first.
pub fn scrape_preview(html: &str) -> Option<(PreviewPattern, String)> {
    [
        (PreviewPattern::AudioPreview, &*AUDIO_PREVIEW),
        (PreviewPattern::PreviewUrl, &*PREVIEW_URL),
    ]
    .into_iter()
    .find_map(|(pattern, re)| {
        re.captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| (pattern, unescape_json(m.as_str())))
    })
}

/// The capture sits inside a JSON string literal; undo escapes such as `\/`
/// and `\u0026`, keeping the raw text if it does not decode.
fn unescape_json(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

pub struct EmbedPreviewResolver {
    embed_base: String,
    http: reqwest::Client,
}

impl EmbedPreviewResolver {
    pub fn new(embed_base: &str, http: reqwest::Client) -> Self {
        Self {
            embed_base: embed_base.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn embed_url(&self, track_id: &str) -> String {
        format!("{}/{}", self.embed_base, urlencoding::encode(track_id))
    }
}

#[async_trait]
impl PreviewSource for EmbedPreviewResolver {
    async fn preview_url(&self, track_id: &str) -> Option<String> {
        let url = self.embed_url(track_id);

        let fetched = match http::send(ENDPOINT, self.http.get(&url)).await {
            Ok(response) => http::read_text(ENDPOINT, response).await,
            Err(e) => Err(e),
        };

        let html = match fetched {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(track_id, "embed page fetch failed: {}", e);
                return None;
            }
        };

        match scrape_preview(&html) {
            Some((pattern, preview)) => {
                tracing::debug!(track_id, ?pattern, "preview scraped from embed page");
                Some(preview)
            }
            None => {
                tracing::warn!(
                    track_id,
                    bytes = html.len(),
                    "embed page matched no preview pattern, markup may have changed"
                );
                None
            }
        }
    }
}

/// Preview source used when scraping is switched off.
pub struct NoPreview;

#[async_trait]
impl PreviewSource for NoPreview {
    async fn preview_url(&self, _track_id: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testutil;
    use axum::{extract::Path, http::StatusCode, routing::get, Router};

    #[test]
    fn test_scrape_audio_preview() {
        let html = r#"<script id="__NEXT_DATA__">{"props":{"audioPreview": {"url": "https://p.scdn.co/x.mp3"},"x":1}}</script>"#;
        assert_eq!(
            scrape_preview(html),
            Some((PreviewPattern::AudioPreview, "https://p.scdn.co/x.mp3".to_string()))
        );
    }

    #[test]
    fn test_scrape_tolerates_whitespace() {
        let html = "\"audioPreview\":\n  {\n   \"url\":  \"https://p.scdn.co/y.mp3\"}";
        assert_eq!(
            scrape_preview(html).map(|(_, url)| url).as_deref(),
            Some("https://p.scdn.co/y.mp3")
        );
    }

    #[test]
    fn test_scrape_preview_url_fallback() {
        let html = r#"{"track":{"preview_url": "https://p.scdn.co/mp3-preview/abc"}}"#;
        assert_eq!(
            scrape_preview(html),
            Some((
                PreviewPattern::PreviewUrl,
                "https://p.scdn.co/mp3-preview/abc".to_string()
            ))
        );
    }

    #[test]
    fn test_audio_preview_wins_over_preview_url() {
        let html = r#"{"preview_url": "https://old"} {"audioPreview": {"url": "https://new"}}"#;
        assert_eq!(
            scrape_preview(html),
            Some((PreviewPattern::AudioPreview, "https://new".to_string()))
        );
    }

    #[test]
    fn test_scrape_unescapes_json() {
        let html = r#"{"audioPreview":{"url":"https:\/\/p.scdn.co\/mp3?a=1&b=2"}}"#;
        assert_eq!(
            scrape_preview(html).map(|(_, url)| url).as_deref(),
            Some("https://p.scdn.co/mp3?a=1&b=2")
        );
    }

    #[test]
    fn test_scrape_miss() {
        assert_eq!(scrape_preview("<html><body>nothing here</body></html>"), None);
        assert_eq!(scrape_preview(r#"{"audioPreview": null}"#), None);
    }

    #[tokio::test]
    async fn test_resolver_fetches_embed_page() {
        let app = Router::new().route(
            "/embed/track/{id}",
            get(|Path(id): Path<String>| async move {
                format!(r#"<html>{{"audioPreview": {{"url": "https://p.scdn.co/{}.mp3"}}}}</html>"#, id)
            }),
        );
        let base = testutil::serve(app).await;
        let resolver =
            EmbedPreviewResolver::new(&format!("{}/embed/track/", base), testutil::client());

        assert_eq!(
            resolver.preview_url("abc123").await.as_deref(),
            Some("https://p.scdn.co/abc123.mp3")
        );
    }

    #[tokio::test]
    async fn test_resolver_miss_and_failure_are_none() {
        let app = Router::new()
            .route("/embed/track/plain", get(|| async { "<html>no json</html>" }))
            .route(
                "/embed/track/broken",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let base = testutil::serve(app).await;
        let resolver =
            EmbedPreviewResolver::new(&format!("{}/embed/track", base), testutil::client());

        assert_eq!(resolver.preview_url("plain").await, None);
        assert_eq!(resolver.preview_url("broken").await, None);
        assert_eq!(resolver.preview_url("missing").await, None);
    }

    #[tokio::test]
    async fn test_unreachable_embed_host_is_none() {
        let resolver = EmbedPreviewResolver::new("http://127.0.0.1:9/embed/track", testutil::client());
        assert_eq!(resolver.preview_url("abc").await, None);
    }

    #[tokio::test]
    async fn test_disabled_source() {
        assert_eq!(NoPreview.preview_url("abc").await, None);
    }
}

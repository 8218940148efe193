use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::MediaError;
use crate::provider::http;
use crate::provider::{
    MediaDetails, MetadataProvider, OAuthToken, PreviewSource, ProviderKind, SearchMatch,
    TokenEndpoint, TrackLength,
};
use crate::state::{SpotifyConfig, TokenManager};

const TOKEN_ENDPOINT: &str = "spotify/token";
const TRACKS_ENDPOINT: &str = "spotify/tracks";
const SEARCH_ENDPOINT: &str = "spotify/search";

pub const SCOPES: [&str; 6] = [
    "user-read-email",
    "user-read-private",
    "playlist-read-private",
    "playlist-read-collaborative",
    "playlist-modify-public",
    "playlist-modify-private",
];

/// Spotify Accounts service: all three grants, authenticated with HTTP Basic
/// `client_id:client_secret`.
pub struct SpotifyAccounts {
    client_id: String,
    client_secret: String,
    token_url: String,
    authorize_url: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct SpotifyTokenResponse {
    access_token: String,
    #[serde(default = "bearer")]
    token_type: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

fn bearer() -> String {
    "Bearer".to_string()
}

impl SpotifyTokenResponse {
    fn into_oauth_token(self) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
            token_type: self.token_type,
            scope: self.scope,
        }
    }
}

impl SpotifyAccounts {
    pub fn new(cfg: &SpotifyConfig, http: reqwest::Client) -> Self {
        Self {
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            token_url: cfg.token_url(),
            authorize_url: cfg.authorize_url(),
            http,
        }
    }

    fn basic_auth_header(&self) -> String {
        use base64::Engine;
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        base64::engine::general_purpose::STANDARD.encode(credentials)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<OAuthToken, MediaError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(MediaError::Auth(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set".to_string(),
            ));
        }

        let request = self
            .http
            .post(&self.token_url)
            .header("Authorization", format!("Basic {}", self.basic_auth_header()))
            .form(params);

        let response = http::send(TOKEN_ENDPOINT, request).await?;

        // 4xx here means the grant or the client credentials were refused
        match http::read_json::<SpotifyTokenResponse>(TOKEN_ENDPOINT, response).await {
            Ok(body) => Ok(body.into_oauth_token()),
            Err(MediaError::Provider {
                status_code,
                message,
                ..
            }) if (400..500).contains(&status_code) => Err(MediaError::Auth(format!(
                "token request rejected ({}): {}",
                status_code, message
            ))),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TokenEndpoint for SpotifyAccounts {
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, MediaError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        self.token_request(&params).await
    }

    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken, MediaError> {
        let refresh = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| MediaError::Auth("No refresh token available".to_string()))?;

        let params = [("grant_type", "refresh_token"), ("refresh_token", refresh)];

        self.token_request(&params).await
    }

    async fn client_credentials(&self) -> Result<OAuthToken, MediaError> {
        self.token_request(&[("grant_type", "client_credentials")])
            .await
    }
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    album: SpotifyAlbum,
    duration_ms: u64,
    #[serde(default)]
    preview_url: Option<String>,
    #[serde(default)]
    external_urls: ExternalUrls,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Deserialize, Default)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Deserialize)]
struct SpotifyImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    tracks: Option<SearchTracks>,
}

#[derive(Deserialize)]
struct SearchTracks {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

impl SpotifyTrack {
    fn primary_artist(&self) -> String {
        self.artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Largest album image; the first one listed wins ties or missing sizes.
    fn best_image(&self) -> Option<&str> {
        let area = |img: &SpotifyImage| {
            u64::from(img.width.unwrap_or(0)) * u64::from(img.height.unwrap_or(0))
        };
        self.album
            .images
            .iter()
            .fold(None::<&SpotifyImage>, |best, img| match best {
                Some(b) if area(b) >= area(img) => Some(b),
                _ => Some(img),
            })
            .map(|img| img.url.as_str())
    }

    fn into_details(self) -> MediaDetails {
        MediaDetails {
            artist: self.primary_artist(),
            thumbnail_url: self.best_image().unwrap_or_default().to_string(),
            duration: TrackLength::from_millis(self.duration_ms),
            preview_url: self.preview_url.filter(|url| !url.is_empty()),
            title: self.name,
        }
    }

    fn into_search_match(self) -> SearchMatch {
        SearchMatch {
            artist_name: self.primary_artist(),
            album_image_url: self.best_image().map(str::to_string),
            preview_url: self.preview_url.filter(|url| !url.is_empty()),
            spotify_url: self.external_urls.spotify,
            track_name: self.name,
            track_id: self.id,
        }
    }
}

/// Spotify Web API track lookups.
pub struct SpotifyProvider {
    api_base: String,
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    previews: Arc<dyn PreviewSource>,
}

impl SpotifyProvider {
    pub fn new(
        api_base: &str,
        http: reqwest::Client,
        tokens: Arc<TokenManager>,
        previews: Arc<dyn PreviewSource>,
    ) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            http,
            tokens,
            previews,
        }
    }

    /// GET with the current bearer token. A 401 forces one token refresh and
    /// one retry; a second 401 is returned as an auth failure.
    async fn api_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MediaError> {
        let token = self.tokens.bearer().await?;
        let request = http::accept_json(self.http.get(url).query(query).bearer_auth(&token));
        let response = http::send(endpoint, request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return http::read_json(endpoint, response).await;
        }

        tracing::info!(endpoint, "access token rejected, refreshing once");
        let fresh = self.tokens.force_refresh(&token).await.ok_or_else(|| {
            MediaError::Auth("access token rejected and could not be refreshed".to_string())
        })?;

        let request = http::accept_json(self.http.get(url).query(query).bearer_auth(&fresh));
        let response = http::send(endpoint, request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(MediaError::Auth(format!(
                "{} rejected the access token after refresh",
                endpoint
            )));
        }
        http::read_json(endpoint, response).await
    }

    async fn fill_preview(&self, track_id: &str, preview: Option<String>) -> Option<String> {
        match preview {
            Some(url) => Some(url),
            None => self.previews.preview_url(track_id).await,
        }
    }

    /// First catalog hit for `artist title`, or `None` when nothing matches.
    pub async fn search_best_match(
        &self,
        artist: &str,
        title: &str,
    ) -> Result<Option<SearchMatch>, MediaError> {
        let url = format!("{}/search", self.api_base);
        let query = format!("{} {}", artist, title);
        let params = [("q", query.as_str()), ("type", "track"), ("limit", "5")];

        let resp: SearchResponse = self.api_get(SEARCH_ENDPOINT, &url, &params).await?;

        let Some(best) = resp
            .tracks
            .and_then(|tracks| tracks.items.into_iter().next())
        else {
            tracing::debug!(artist, title, "no spotify match");
            return Ok(None);
        };

        let mut found = best.into_search_match();
        found.preview_url = self.fill_preview(&found.track_id, found.preview_url.take()).await;
        Ok(Some(found))
    }
}

#[async_trait]
impl MetadataProvider for SpotifyProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Spotify
    }

    async fn fetch_details(&self, id: &str) -> Result<MediaDetails, MediaError> {
        let url = format!("{}/tracks/{}", self.api_base, urlencoding::encode(id));
        let track: SpotifyTrack = self.api_get(TRACKS_ENDPOINT, &url, &[]).await?;

        let mut details = track.into_details();
        details.preview_url = self.fill_preview(id, details.preview_url.take()).await;
        Ok(details)
    }
}

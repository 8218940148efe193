use crate::error::MediaError;
use crate::provider::{MediaDetails, OAuthToken, ProviderKind};
use async_trait::async_trait;

/// An OAuth2 token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// URL the user is sent to for the authorization-code grant
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String;

    /// Exchange an authorization code for tokens. Called once per code.
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
        -> Result<OAuthToken, MediaError>;

    /// Refresh-token grant. Returns the provider's answer as is; a
    /// `refresh_token` of `None` means the provider did not rotate it.
    async fn refresh_token(&self, token: &OAuthToken) -> Result<OAuthToken, MediaError>;

    /// Client-credentials grant for app-only catalog lookups
    async fn client_credentials(&self) -> Result<OAuthToken, MediaError>;
}

/// Looks up one video/track by provider ID.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn fetch_details(&self, id: &str) -> Result<MediaDetails, MediaError>;
}

/// Best-effort source of a playable preview URL. Never fails: a miss of any
/// kind is `None`.
#[async_trait]
pub trait PreviewSource: Send + Sync {
    async fn preview_url(&self, track_id: &str) -> Option<String>;
}

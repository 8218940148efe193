use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use bandmeta::provider::{
    http, EmbedPreviewResolver, NoPreview, PreviewSource, ProviderKind, SpotifyAccounts,
    SpotifyProvider, YoutubeProvider,
};
use bandmeta::state::{Config, TokenManager};
use bandmeta::MediaResolver;

/// Everything a command needs, built once from the resolved config.
pub struct Context {
    pub config: Config,
    pub http: reqwest::Client,
    pub tokens: Arc<TokenManager>,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let http = http::build_client(&config.http).context("Failed to build HTTP client")?;

        let accounts = SpotifyAccounts::new(&config.spotify, http.clone());
        let tokens = TokenManager::new(
            ProviderKind::Spotify,
            Arc::new(accounts),
            config.spotify.grant,
        )
        .with_store(&config.data_dir);

        Ok(Self {
            config,
            http,
            tokens: Arc::new(tokens),
        })
    }

    pub fn embed_previews(&self) -> EmbedPreviewResolver {
        EmbedPreviewResolver::new(&self.config.spotify.embed_base, self.http.clone())
    }

    fn previews(&self) -> Arc<dyn PreviewSource> {
        if self.config.spotify.scrape_previews {
            Arc::new(self.embed_previews())
        } else {
            Arc::new(NoPreview)
        }
    }

    pub fn spotify(&self) -> SpotifyProvider {
        SpotifyProvider::new(
            &self.config.spotify.api_base,
            self.http.clone(),
            Arc::clone(&self.tokens),
            self.previews(),
        )
    }

    pub fn youtube(&self) -> YoutubeProvider {
        YoutubeProvider::new(&self.config.youtube, self.http.clone())
    }

    pub fn resolver(&self) -> MediaResolver {
        MediaResolver::new()
            .with_provider(Arc::new(self.youtube()))
            .with_provider(Arc::new(self.spotify()))
    }

    /// Persist config changes made by a command (grant mode after login/logout).
    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.config.config_path())
    }
}

/// Print `value` as pretty JSON, or hand it to `human` for plain output.
pub fn emit<T, F>(json: bool, value: &T, human: F) -> Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if json {
        let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
        println!("{}", out);
    } else {
        human(value);
    }
    Ok(())
}

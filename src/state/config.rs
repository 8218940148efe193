use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::state::token::GrantMode;

pub const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_EMBED_BASE: &str = "https://open.spotify.com/embed/track";
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub log_filter: String,
    pub http: HttpConfig,
    pub spotify: SpotifyConfig,
    pub youtube: YoutubeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpotifyConfig {
    /// Read from `SPOTIFY_CLIENT_ID`, never written to disk.
    #[serde(skip)]
    pub client_id: String,
    /// Read from `SPOTIFY_CLIENT_SECRET`, never written to disk.
    #[serde(skip)]
    pub client_secret: String,
    pub redirect_uri: String,
    pub grant: GrantMode,
    pub accounts_base: String,
    pub api_base: String,
    pub embed_base: String,
    /// Fall back to scraping the embed page when the API has no preview.
    pub scrape_previews: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YoutubeConfig {
    /// Read from `YOUTUBE_API_KEY`, never written to disk.
    #[serde(skip)]
    pub api_key: String,
    pub api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".bandmeta"),
            log_filter: "bandmeta=info".to_string(),
            http: HttpConfig::default(),
            spotify: SpotifyConfig::default(),
            youtube: YoutubeConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            user_agent: concat!("bandmeta/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
            grant: GrantMode::ClientCredentials,
            accounts_base: SPOTIFY_ACCOUNTS_BASE.to_string(),
            api_base: SPOTIFY_API_BASE.to_string(),
            embed_base: SPOTIFY_EMBED_BASE.to_string(),
            scrape_previews: true,
        }
    }
}

impl SpotifyConfig {
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_base.trim_end_matches('/'))
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts_base.trim_end_matches('/'))
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: YOUTUBE_API_BASE.to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config TOML from {:?}", path))
    }

    /// Load `<data_dir>/config.toml` when present, defaults otherwise, then
    /// pull secrets from the environment.
    pub fn resolve(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join("config.toml");
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = var("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = id;
        }
        if let Some(secret) = var("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = secret;
        }
        if let Some(key) = var("YOUTUBE_API_KEY") {
            self.youtube.api_key = key;
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content =
            toml::to_string_pretty(&self).with_context(|| "Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::write(path, content).with_context(|| format!("Failed to write config to {:?}", path))
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.data_dir.join("credentials")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from(".bandmeta"));
        assert_eq!(config.spotify.grant, GrantMode::ClientCredentials);
        assert!(config.spotify.scrape_previews);
        assert_eq!(config.http.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.spotify.grant = GrantMode::AuthorizationCode;
        config.spotify.scrape_previews = false;
        config.http.timeout_secs = 3;

        config.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_secrets_are_not_persisted() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.spotify.client_secret = "hunter2".to_string();
        config.youtube.api_key = "yt-key".to_string();
        config.save(&config_path).unwrap();

        let raw = fs::read_to_string(&config_path).unwrap();
        assert!(!raw.contains("hunter2"));
        assert!(!raw.contains("yt-key"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[spotify]\nscrape_previews = false\n").unwrap();
        assert!(!config.spotify.scrape_previews);
        assert_eq!(config.spotify.api_base, SPOTIFY_API_BASE);
        assert_eq!(config.youtube.api_base, YOUTUBE_API_BASE);
    }

    #[test]
    fn test_apply_env() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "SPOTIFY_CLIENT_ID" => Some("id".to_string()),
            "YOUTUBE_API_KEY" => Some("key".to_string()),
            _ => None,
        });
        assert_eq!(config.spotify.client_id, "id");
        assert_eq!(config.spotify.client_secret, "");
        assert_eq!(config.youtube.api_key, "key");
    }

    #[test]
    fn test_config_paths() {
        let config = Config::default();
        assert_eq!(config.config_path(), PathBuf::from(".bandmeta/config.toml"));
        assert_eq!(config.credentials_dir(), PathBuf::from(".bandmeta/credentials"));
        assert_eq!(
            config.spotify.token_url(),
            "https://accounts.spotify.com/api/token"
        );
    }
}

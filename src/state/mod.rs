pub mod config;
pub mod credentials;
pub mod token;

pub use config::{Config, HttpConfig, SpotifyConfig, YoutubeConfig};
pub use token::{GrantMode, TokenManager, TokenStatus};

//! Media metadata layer for the band app: link parsing, OAuth token
//! lifecycle, YouTube/Spotify metadata and the Spotify preview fallback.

pub mod error;
pub mod logging;
pub mod provider;
pub mod resolver;
pub mod state;
pub mod utils;

pub use error::MediaError;
pub use resolver::{MediaResolver, ResolvedMedia};

pub mod http;
pub mod link;
pub mod preview;
pub mod spotify;
mod traits;
mod types;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testutil;

pub use link::{detect_platform, extract_id, parse_link, ExternalLinkIdentifier};
pub use preview::{EmbedPreviewResolver, NoPreview};
pub use spotify::{SpotifyAccounts, SpotifyProvider};
pub use traits::{MetadataProvider, PreviewSource, TokenEndpoint};
pub use types::*;
pub use youtube::YoutubeProvider;

//! Link in, normalized metadata out.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::MediaError;
use crate::provider::{parse_link, ExternalLinkIdentifier, MediaDetails, MetadataProvider, ProviderKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMedia {
    pub link: ExternalLinkIdentifier,
    pub details: MediaDetails,
}

/// Routes a parsed link to the fetcher registered for its provider.
#[derive(Default)]
pub struct MediaResolver {
    providers: HashMap<ProviderKind, Arc<dyn MetadataProvider>>,
}

impl MediaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// `Ok(None)` when the URL is not a recognizable YouTube or Spotify link.
    pub async fn resolve(&self, url: &str) -> Result<Option<ResolvedMedia>, MediaError> {
        let Some(link) = parse_link(url) else {
            tracing::debug!(url, "not a supported media link");
            return Ok(None);
        };

        let details = self.fetch(&link).await?;
        Ok(Some(ResolvedMedia { link, details }))
    }

    pub async fn fetch(&self, link: &ExternalLinkIdentifier) -> Result<MediaDetails, MediaError> {
        let provider = self
            .providers
            .get(&link.provider)
            .ok_or_else(|| MediaError::NotConfigured(link.provider.to_string()))?;

        tracing::debug!(provider = %link.provider, id = %link.id, "fetching details");
        provider.fetch_details(&link.id).await
    }
}

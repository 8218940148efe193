//! Owned OAuth token state for one provider session.
//!
//! Refreshes are coalesced: the first caller that finds the token missing or
//! inside the pre-expiry window parks a shared future in the slot, and every
//! caller arriving while it is pending awaits that same future. The provider
//! never sees two refresh requests racing on one refresh token.

use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::MediaError;
use crate::provider::{OAuthToken, ProviderKind, TokenEndpoint};
use crate::state::credentials::CredentialStore;

/// Refresh this long before the provider's expiry.
pub const REFRESH_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantMode {
    /// Tokens come from a user login; without one the caller must send the
    /// user through the authorize URL.
    AuthorizationCode,
    /// The app authenticates itself and can always mint a new token.
    ClientCredentials,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenStatus {
    NoToken,
    Valid,
    Expiring,
    Refreshing,
    Invalid,
}

type PendingRefresh = Shared<BoxFuture<'static, Result<OAuthToken, MediaError>>>;

#[derive(Default)]
struct Slot {
    token: Option<OAuthToken>,
    pending: Option<(u64, PendingRefresh)>,
    generation: u64,
    invalid: bool,
}

pub struct TokenManager {
    provider: ProviderKind,
    endpoint: Arc<dyn TokenEndpoint>,
    mode: GrantMode,
    store: Option<CredentialStore>,
    skew: Duration,
    slot: Mutex<Slot>,
}

impl TokenManager {
    pub fn new(provider: ProviderKind, endpoint: Arc<dyn TokenEndpoint>, mode: GrantMode) -> Self {
        Self {
            provider,
            endpoint,
            mode,
            store: None,
            skew: Duration::seconds(REFRESH_SKEW_SECS),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Mirror the token to `<data_dir>/credentials`, loading whatever a
    /// previous session left there. An unreadable file starts the session
    /// without a token; the next save overwrites it.
    pub fn with_store(mut self, data_dir: &Path) -> Self {
        let store = CredentialStore::new(data_dir);
        let stored = match store.load(self.provider) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(provider = %self.provider, "ignoring unreadable stored token: {:#}", e);
                None
            }
        };
        if stored.is_some() {
            tracing::debug!(provider = %self.provider, "loaded stored token");
        }
        self.slot.get_mut().token = stored;
        self.store = Some(store);
        self
    }

    pub fn with_token(mut self, token: OAuthToken) -> Self {
        self.slot.get_mut().token = Some(token);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn mode(&self) -> GrantMode {
        self.mode
    }

    /// Where to send the user for the authorization-code grant.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        self.endpoint.authorize_url(redirect_uri, state)
    }

    pub async fn current(&self) -> Option<OAuthToken> {
        self.slot.lock().await.token.clone()
    }

    pub async fn status(&self) -> TokenStatus {
        let slot = self.slot.lock().await;
        if slot.pending.is_some() {
            return TokenStatus::Refreshing;
        }
        match &slot.token {
            Some(token) if token.expires_within(self.skew) => TokenStatus::Expiring,
            Some(_) => TokenStatus::Valid,
            None if slot.invalid => TokenStatus::Invalid,
            None => TokenStatus::NoToken,
        }
    }

    /// A usable access token, refreshing first when inside the pre-expiry
    /// window. `None` means the caller has to run the authorization-code flow.
    pub async fn get_valid_token(&self) -> Option<String> {
        let (generation, pending) = {
            let mut slot = self.slot.lock().await;
            let fresh = slot
                .token
                .as_ref()
                .filter(|token| !token.expires_within(self.skew))
                .map(|token| token.access_token.clone());
            if fresh.is_some() {
                return fresh;
            }
            if slot.token.is_none()
                && slot.pending.is_none()
                && self.mode == GrantMode::AuthorizationCode
            {
                return None;
            }
            self.join_or_start(&mut slot)
        };

        self.settle(generation, pending)
            .await
            .ok()
            .map(|token| token.access_token)
    }

    /// Like [`get_valid_token`](Self::get_valid_token) but a missing token is
    /// an [`MediaError::Auth`].
    pub async fn bearer(&self) -> Result<String, MediaError> {
        self.get_valid_token().await.ok_or_else(|| {
            MediaError::Auth(format!(
                "no valid {} token, run the authorization flow",
                self.provider
            ))
        })
    }

    /// Refresh after the provider rejected `rejected`. When another caller has
    /// already replaced that token, the replacement is returned without a
    /// second refresh.
    pub async fn force_refresh(&self, rejected: &str) -> Option<String> {
        let (generation, pending) = {
            let mut slot = self.slot.lock().await;
            if slot.pending.is_none() {
                let replaced = slot
                    .token
                    .as_ref()
                    .filter(|token| {
                        token.access_token != rejected && !token.expires_within(self.skew)
                    })
                    .map(|token| token.access_token.clone());
                if replaced.is_some() {
                    return replaced;
                }
                if slot.token.is_none() && self.mode == GrantMode::AuthorizationCode {
                    return None;
                }
            }
            self.join_or_start(&mut slot)
        };

        self.settle(generation, pending)
            .await
            .ok()
            .map(|token| token.access_token)
    }

    /// One-shot authorization-code exchange. Failures propagate; nothing is
    /// retried and the held token is left untouched.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthToken, MediaError> {
        let token = self.endpoint.exchange_code(code, redirect_uri).await?;
        self.store_token(token.clone()).await?;
        tracing::info!(provider = %self.provider, "authorization code exchanged");
        Ok(token)
    }

    /// Replace the held token. Any refresh still in flight is abandoned and
    /// its result discarded.
    pub async fn store_token(&self, token: OAuthToken) -> Result<(), MediaError> {
        let mut slot = self.slot.lock().await;
        self.persist(&token)?;
        slot.token = Some(token);
        slot.pending = None;
        slot.invalid = false;
        Ok(())
    }

    /// Logout: drop the token from memory and durable storage.
    pub async fn clear(&self) -> Result<(), MediaError> {
        let mut slot = self.slot.lock().await;
        *slot = Slot {
            generation: slot.generation,
            ..Slot::default()
        };
        self.forget()?;
        Ok(())
    }

    fn join_or_start(&self, slot: &mut Slot) -> (u64, PendingRefresh) {
        if let Some((generation, pending)) = &slot.pending {
            return (*generation, pending.clone());
        }

        let endpoint = Arc::clone(&self.endpoint);
        let current = slot.token.clone();
        let mode = self.mode;
        let provider = self.provider;

        let pending = async move {
            match current {
                Some(token) if token.refresh_token.is_some() => {
                    tracing::debug!(provider = %provider, "refreshing access token");
                    let mut fresh = endpoint.refresh_token(&token).await?;
                    // Providers may omit the refresh token when they do not rotate it.
                    if fresh.refresh_token.is_none() {
                        fresh.refresh_token = token.refresh_token;
                    }
                    Ok(fresh)
                }
                _ if mode == GrantMode::ClientCredentials => {
                    tracing::debug!(provider = %provider, "requesting client-credentials token");
                    endpoint.client_credentials().await
                }
                _ => Err(MediaError::Auth("no refresh token available".to_string())),
            }
        }
        .boxed()
        .shared();

        slot.generation += 1;
        slot.pending = Some((slot.generation, pending.clone()));
        (slot.generation, pending)
    }

    /// Await a pending refresh. The first waiter to wake records the outcome;
    /// a result whose slot was cleared or replaced meanwhile is discarded.
    async fn settle(
        &self,
        generation: u64,
        pending: PendingRefresh,
    ) -> Result<OAuthToken, MediaError> {
        let result = pending.await;

        let mut slot = self.slot.lock().await;
        let owns_slot = matches!(&slot.pending, Some((current, _)) if *current == generation);
        if !owns_slot {
            return result;
        }
        slot.pending = None;

        match &result {
            Ok(token) => {
                if let Err(e) = self.persist(token) {
                    tracing::warn!(provider = %self.provider, "could not persist refreshed token: {}", e);
                }
                slot.token = Some(token.clone());
                slot.invalid = false;
                tracing::info!(provider = %self.provider, "access token refreshed");
            }
            Err(e) if !e.is_auth() => {
                // transient: keep the refresh token so the next call retries
                tracing::warn!(provider = %self.provider, "token refresh failed, will retry: {}", e);
            }
            Err(e) => {
                tracing::warn!(provider = %self.provider, "token refresh rejected: {}", e);
                slot.token = None;
                slot.invalid = true;
                if let Err(e) = self.forget() {
                    tracing::warn!(provider = %self.provider, "could not drop stored token: {}", e);
                }
            }
        }

        result
    }

    fn persist(&self, token: &OAuthToken) -> Result<(), MediaError> {
        if let Some(store) = &self.store {
            store.save(self.provider, token)?;
        }
        Ok(())
    }

    fn forget(&self) -> Result<(), MediaError> {
        if let Some(store) = &self.store {
            store.delete(self.provider)?;
        }
        Ok(())
    }
}

//! Durable mirror of the token state, encrypted at rest under
//! `<data_dir>/credentials/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::{OAuthToken, ProviderKind};
use crate::utils::crypto;

/// What actually gets sealed: the token plus which provider it belongs to,
/// so a file copied to the wrong slot is refused instead of used.
#[derive(Serialize, Deserialize)]
struct StoredToken {
    provider: ProviderKind,
    saved_at: DateTime<Utc>,
    token: OAuthToken,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    data_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
        }
    }

    pub fn path(&self, provider: ProviderKind) -> PathBuf {
        let filename = match provider {
            ProviderKind::Spotify => "spotify.token",
            ProviderKind::Youtube => "youtube.token",
        };
        self.data_dir.join("credentials").join(filename)
    }

    /// Seal and write the token. The file is replaced by rename so a crash
    /// mid-write leaves the previous token readable.
    pub fn save(&self, provider: ProviderKind, token: &OAuthToken) -> Result<()> {
        let path = self.path(provider);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create credentials dir {:?}", parent))?;
        }

        let record = StoredToken {
            provider,
            saved_at: Utc::now(),
            token: token.clone(),
        };
        let json = serde_json::to_vec(&record).context("Failed to serialize token")?;
        let sealed =
            crypto::encrypt(&json, &self.data_dir).context("Failed to encrypt credentials")?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(sealed);

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, encoded)
            .with_context(|| format!("Failed to write credentials to {:?}", tmp))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move credentials into {:?}", path))?;
        tracing::debug!(%provider, "token stored");
        Ok(())
    }

    pub fn load(&self, provider: ProviderKind) -> Result<Option<OAuthToken>> {
        let path = self.path(provider);
        if !path.exists() {
            return Ok(None);
        }

        let encoded = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read credentials from {:?}", path))?;
        let sealed = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .context("Failed to decode credentials")?;
        let json = crypto::decrypt(&sealed, &self.data_dir)
            .with_context(|| format!("Failed to decrypt {:?}", path))?;
        let record: StoredToken =
            serde_json::from_slice(&json).context("Failed to parse stored token")?;

        if record.provider != provider {
            anyhow::bail!(
                "{:?} holds a {} token, expected {}",
                path,
                record.provider,
                provider
            );
        }
        Ok(Some(record.token))
    }

    /// Remove the stored token. Missing files are not an error.
    pub fn delete(&self, provider: ProviderKind) -> Result<()> {
        let path = self.path(provider);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete credentials {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn sample_token(access: &str) -> OAuthToken {
        OAuthToken {
            access_token: access.to_string(),
            refresh_token: Some("test_refresh_token".to_string()),
            expires_at: Utc::now() + Duration::hours(1),
            token_type: "Bearer".to_string(),
            scope: Some("playlist-read-private".to_string()),
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());
        let token = sample_token("test_access_token");

        store.save(ProviderKind::Spotify, &token).unwrap();

        assert_eq!(store.load(ProviderKind::Spotify).unwrap(), Some(token));
        assert!(!store.path(ProviderKind::Spotify).with_extension("tmp").exists());
    }

    #[test]
    fn test_stored_file_is_not_plaintext() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());
        store.save(ProviderKind::Spotify, &sample_token("visible?")).unwrap();

        let raw = fs::read_to_string(store.path(ProviderKind::Spotify)).unwrap();
        assert!(!raw.contains("visible?"));
        assert!(!raw.contains("test_refresh_token"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());
        store.save(ProviderKind::Spotify, &sample_token("a")).unwrap();

        let mode = fs::metadata(store.path(ProviderKind::Spotify))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_load_nonexistent() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());
        assert!(store.load(ProviderKind::Spotify).unwrap().is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());

        store.save(ProviderKind::Spotify, &sample_token("a")).unwrap();
        store.delete(ProviderKind::Spotify).unwrap();
        assert!(store.load(ProviderKind::Spotify).unwrap().is_none());

        store.delete(ProviderKind::Spotify).unwrap();
    }

    #[test]
    fn test_misplaced_file_is_refused() {
        let temp = TempDir::new().unwrap();
        let store = CredentialStore::new(temp.path());

        store.save(ProviderKind::Youtube, &sample_token("yt")).unwrap();
        fs::copy(
            store.path(ProviderKind::Youtube),
            store.path(ProviderKind::Spotify),
        )
        .unwrap();

        assert!(store.load(ProviderKind::Youtube).unwrap().is_some());
        assert!(store.load(ProviderKind::Spotify).is_err());
    }
}

//! AES-256-GCM sealing for the on-disk token mirror.
//!
//! Layout of a sealed blob: 12-byte nonce followed by the ciphertext and tag.
//! The key lives next to the credentials in `<data_dir>/credentials/token.key`.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const KEY_FILE: &str = "token.key";
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

fn key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("credentials").join(KEY_FILE)
}

fn read_key(path: &Path) -> Result<Key<Aes256Gcm>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read key {:?}", path))?;
    if bytes.len() != KEY_SIZE {
        bail!("Invalid encryption key size ({} bytes)", bytes.len());
    }
    Ok(Key::<Aes256Gcm>::from_slice(&bytes).clone())
}

fn load_or_create_key(data_dir: &Path) -> Result<Key<Aes256Gcm>> {
    let path = key_path(data_dir);
    if path.exists() {
        return read_key(&path);
    }

    let key = Aes256Gcm::generate_key(OsRng);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    fs::write(&path, key.as_slice()).context("Failed to write encryption key")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(key)
}

pub fn encrypt(data: &[u8], data_dir: &Path) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(&load_or_create_key(data_dir)?);
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    let mut sealed = nonce.to_vec();
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a blob sealed by [`encrypt`]. A missing key is an error: there is
/// nothing it could decrypt.
pub fn decrypt(sealed: &[u8], data_dir: &Path) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE {
        bail!("Invalid encrypted data: too short");
    }

    let cipher = Aes256Gcm::new(&read_key(&key_path(data_dir))?);
    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encrypt_decrypt() {
        let temp = TempDir::new().unwrap();
        let data = b"refresh-token-material";

        let sealed = encrypt(data, temp.path()).unwrap();
        assert_ne!(&sealed[NONCE_SIZE..], data);

        let opened = decrypt(&sealed, temp.path()).unwrap();
        assert_eq!(opened, data);
    }

    #[test]
    fn test_nonce_differs_per_call() {
        let temp = TempDir::new().unwrap();
        let a = encrypt(b"same", temp.path()).unwrap();
        let b = encrypt(b"same", temp.path()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decrypt_without_key_fails() {
        let sealer = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();

        let sealed = encrypt(b"data", sealer.path()).unwrap();
        assert!(decrypt(&sealed, other.path()).is_err());
    }

    #[test]
    fn test_tampered_blob_fails() {
        let temp = TempDir::new().unwrap();
        let mut sealed = encrypt(b"data", temp.path()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xff;

        assert!(decrypt(&sealed, temp.path()).is_err());
        assert!(decrypt(&sealed[..4], temp.path()).is_err());
    }
}

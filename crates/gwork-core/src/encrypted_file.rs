//! Encrypted file backend using AES-256-GCM
//!
//! A single map file inside the backend directory holds every entry,
//! encrypted with a key derived from the resolved backend password. Each
//! operation loads and decrypts the file fresh; nothing is cached between
//! calls.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroize;

use crate::error::{CredentialError, Result};
use crate::secure_string::SecureString;

/// File inside the backend directory holding all entries
const STORE_FILE: &str = "tokens.enc";

/// Domain separation for key derivation
const KDF_SALT: &[u8] = b"gwork-file-keyring-v1";

/// Default directory for the file backend
pub(crate) fn default_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().or_else(dirs::home_dir).ok_or_else(|| {
        CredentialError::Backend("Cannot determine data directory".to_string())
    })?;
    Ok(data_dir.join("gwork"))
}

/// Create the backend directory if missing, restricted to the owner.
/// Idempotent.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| {
        CredentialError::Backend(format!("Failed to create {}: {}", dir.display(), e))
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o700);
        let _ = fs::set_permissions(dir, perms);
    }

    Ok(())
}

/// Derive the 256-bit cipher key from the backend password
fn derive_key(password: &SecureString) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(password.expose().as_bytes());
    hasher.update(KDF_SALT);
    let result = hasher.finalize();

    let mut key = [0u8; 32];
    key.copy_from_slice(&result);
    key
}

pub(crate) struct EncryptedFileBackend {
    path: PathBuf,
    key: [u8; 32],
}

impl std::fmt::Debug for EncryptedFileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileBackend")
            .field("path", &self.path)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl Drop for EncryptedFileBackend {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl EncryptedFileBackend {
    /// Open the file backend rooted at `dir`, deriving the cipher key from
    /// `password`. Decrypts eagerly so a wrong password fails at open
    /// rather than on the first read.
    pub fn open(dir: &Path, password: &SecureString) -> Result<Self> {
        let backend = Self {
            path: dir.join(STORE_FILE),
            key: derive_key(password),
        };
        backend.load()?;
        Ok(backend)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CredentialError::Encryption(format!("Failed to create cipher: {}", e)))?;

        // Random 12-byte nonce, prepended to the ciphertext
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CredentialError::Encryption(format!("Encryption failed: {}", e)))?;

        let mut result = nonce_bytes.to_vec();
        result.extend(ciphertext);
        Ok(result)
    }

    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        if encrypted.len() < 12 {
            return Err(CredentialError::Encryption(
                "Invalid encrypted data".to_string(),
            ));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CredentialError::Encryption(format!("Failed to create cipher: {}", e)))?;

        let (nonce_bytes, ciphertext) = encrypted.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher.decrypt(nonce, ciphertext).map_err(|_| {
            CredentialError::Encryption(
                "Decryption failed: wrong password or corrupted store".to_string(),
            )
        })
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let encoded = fs::read_to_string(&self.path).map_err(|e| {
            CredentialError::Backend(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let encrypted = BASE64
            .decode(encoded.trim())
            .map_err(|e| CredentialError::Encryption(format!("Failed to decode store: {}", e)))?;

        let mut decrypted = self.decrypt(&encrypted)?;
        let entries = serde_json::from_slice(&decrypted)?;
        decrypted.zeroize();

        Ok(entries)
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        let mut json = serde_json::to_vec(entries)?;
        let encrypted = self.encrypt(&json)?;
        json.zeroize();

        fs::write(&self.path, BASE64.encode(&encrypted)).map_err(|e| {
            CredentialError::Backend(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        // Owner-only, the file holds every refresh token
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!(path = %self.path.display(), count = entries.len(), "Saved file keyring");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<SecureString> {
        let entries = self.load()?;
        entries
            .get(key)
            .map(SecureString::new)
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Err(CredentialError::NotFound(key.to_string()));
        }
        self.save(&entries)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = self.load()?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn password() -> SecureString {
        SecureString::new("correct horse")
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        ensure_dir(dir.path()).unwrap();

        let backend = EncryptedFileBackend::open(dir.path(), &password()).unwrap();
        backend.set("token:a@b.com", "payload").unwrap();
        assert_eq!(backend.get("token:a@b.com").unwrap().expose(), "payload");

        // A fresh open with the same password sees the entry
        let reopened = EncryptedFileBackend::open(dir.path(), &password()).unwrap();
        assert_eq!(reopened.get("token:a@b.com").unwrap().expose(), "payload");
    }

    #[test]
    fn wrong_password_fails_at_open() {
        let dir = TempDir::new().unwrap();
        ensure_dir(dir.path()).unwrap();

        let backend = EncryptedFileBackend::open(dir.path(), &password()).unwrap();
        backend.set("token:a@b.com", "payload").unwrap();

        let err = EncryptedFileBackend::open(dir.path(), &SecureString::new("wrong")).unwrap_err();
        assert!(matches!(err, CredentialError::Encryption(_)));
    }

    #[test]
    fn store_on_disk_is_not_plaintext() {
        let dir = TempDir::new().unwrap();
        ensure_dir(dir.path()).unwrap();

        let backend = EncryptedFileBackend::open(dir.path(), &password()).unwrap();
        backend.set("token:a@b.com", "very-secret-rt").unwrap();

        let raw = fs::read_to_string(dir.path().join(STORE_FILE)).unwrap();
        assert!(!raw.contains("very-secret-rt"));
        assert!(!raw.contains("a@b.com"));
    }

    #[cfg(unix)]
    #[test]
    fn directory_and_file_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let parent = TempDir::new().unwrap();
        let dir = parent.path().join("store");
        ensure_dir(&dir).unwrap();
        assert_eq!(fs::metadata(&dir).unwrap().permissions().mode() & 0o777, 0o700);

        let backend = EncryptedFileBackend::open(&dir, &password()).unwrap();
        backend.set("token:a@b.com", "x").unwrap();
        let mode = fs::metadata(dir.join(STORE_FILE)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn removing_a_missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        ensure_dir(dir.path()).unwrap();

        let backend = EncryptedFileBackend::open(dir.path(), &password()).unwrap();
        assert!(matches!(
            backend.remove("token:missing@b.com"),
            Err(CredentialError::NotFound(_))
        ));
    }
}

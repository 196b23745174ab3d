//! Native OS keyring backend
//!
//! One entry per storage key under a fixed service name, stored by the
//! platform secret manager through the `keyring` crate. Platform keyrings
//! offer no enumeration, so the backend keeps an index entry (a reserved
//! username disjoint from every storage key) holding the JSON list of live
//! keys; the index is rewritten on every set and remove.

#[cfg(not(feature = "native-keyring"))]
use tracing::warn;

use crate::error::{CredentialError, Result};
use crate::secure_string::SecureString;

/// Service name for all gwork entries in the OS keyring
#[cfg(feature = "native-keyring")]
const SERVICE: &str = "gwork";

/// Reserved entry holding the JSON list of live storage keys
#[cfg(feature = "native-keyring")]
const INDEX_ENTRY: &str = "__index__";

pub(crate) struct KeychainBackend;

#[cfg(feature = "native-keyring")]
impl KeychainBackend {
    /// Open the native keyring, verifying the platform store is reachable.
    ///
    /// A missing index just means nothing has been stored yet; any other
    /// failure (including a locked keychain) is surfaced so the caller can
    /// recover or fall back.
    pub fn open() -> Result<Self> {
        let backend = Self;
        match backend.read_index() {
            Ok(_) | Err(CredentialError::NotFound(_)) => Ok(backend),
            Err(e) => Err(e),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(SERVICE, key).map_err(|e| {
            CredentialError::Backend(format!("Failed to create keyring entry: {}", e))
        })
    }

    fn read_index(&self) -> Result<Vec<String>> {
        match self.entry(INDEX_ENTRY)?.get_password() {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(keyring::Error::NoEntry) => {
                Err(CredentialError::NotFound(INDEX_ENTRY.to_string()))
            }
            Err(e) => Err(CredentialError::Backend(format!("Keyring error: {}", e))),
        }
    }

    fn write_index(&self, keys: &[String]) -> Result<()> {
        let raw = serde_json::to_string(keys)?;
        self.entry(INDEX_ENTRY)?
            .set_password(&raw)
            .map_err(|e| CredentialError::Backend(format!("Keyring error: {}", e)))
    }

    pub fn get(&self, key: &str) -> Result<SecureString> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(SecureString::new(value)),
            Err(keyring::Error::NoEntry) => Err(CredentialError::NotFound(key.to_string())),
            Err(e) => Err(CredentialError::Backend(format!("Keyring error: {}", e))),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| CredentialError::Backend(format!("Keyring error: {}", e)))?;

        let mut keys = self.keys()?;
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
            self.write_index(&keys)?;
        }
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => {}
            Err(keyring::Error::NoEntry) => {
                return Err(CredentialError::NotFound(key.to_string()))
            }
            Err(e) => return Err(CredentialError::Backend(format!("Keyring error: {}", e))),
        }

        let mut keys = self.keys()?;
        keys.retain(|k| k != key);
        self.write_index(&keys)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        match self.read_index() {
            Ok(keys) => Ok(keys),
            Err(CredentialError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(not(feature = "native-keyring"))]
impl KeychainBackend {
    fn unavailable() -> CredentialError {
        CredentialError::Backend("Built without native-keyring support".to_string())
    }

    pub fn open() -> Result<Self> {
        warn!("Native keyring support compiled out, select the file backend");
        Err(Self::unavailable())
    }

    pub fn get(&self, _key: &str) -> Result<SecureString> {
        Err(Self::unavailable())
    }

    pub fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Err(Self::unavailable())
    }

    pub fn remove(&self, _key: &str) -> Result<()> {
        Err(Self::unavailable())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Err(Self::unavailable())
    }
}

//! In-memory backend (for testing)

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{handle_lock_poison, CredentialError, Result};
use crate::secure_string::SecureString;

/// Map-backed store mirroring the native keyring's semantics: reading or
/// removing a missing key is `NotFound`.
pub(crate) struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Result<SecureString> {
        let entries = self.entries.read().map_err(handle_lock_poison)?;
        entries
            .get(key)
            .map(SecureString::new)
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(handle_lock_poison)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(handle_lock_poison)?;
        entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(handle_lock_poison)?;
        Ok(entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_operations() {
        let backend = MemoryBackend::new();

        backend.set("token:a@b.com", "payload").unwrap();
        assert_eq!(backend.get("token:a@b.com").unwrap().expose(), "payload");

        backend.remove("token:a@b.com").unwrap();
        assert!(matches!(
            backend.get("token:a@b.com"),
            Err(CredentialError::NotFound(_))
        ));
    }

    #[test]
    fn removing_a_missing_key_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.remove("token:missing@b.com"),
            Err(CredentialError::NotFound(_))
        ));
    }

    #[test]
    fn keys_reflect_writes() {
        let backend = MemoryBackend::new();
        assert!(backend.keys().unwrap().is_empty());

        backend.set("token:a@b.com", "x").unwrap();
        backend.set("default-account", "a@b.com").unwrap();

        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["default-account", "token:a@b.com"]);
    }
}

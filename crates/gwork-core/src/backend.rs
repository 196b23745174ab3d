//! Keyring backend selection and validation
//!
//! The effective backend comes from a precedence chain over values the
//! caller has already fetched: environment beats config file beats the
//! built-in `"auto"`. Resolution and validation are pure functions so they
//! are testable without touching process globals.

use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, Result};

/// A concrete secret-storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyringBackend {
    /// OS-native secret manager (macOS Keychain, Secret Service, Windows
    /// Credential Manager)
    Keychain,
    /// Encrypted file fallback
    File,
    /// In-memory only (for testing)
    Memory,
}

impl std::fmt::Display for KeyringBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keychain => write!(f, "keychain"),
            Self::File => write!(f, "file"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Which configuration layer produced the effective backend value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendSource {
    /// Built-in default, nothing was configured
    Default,
    /// Application config file
    Config,
    /// Environment variable override
    Env,
}

/// The resolved backend selector and its provenance, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringBackendInfo {
    /// Normalized selector: `"auto"`, `"keychain"` or `"file"`
    pub value: String,
    /// The layer that produced it
    pub source: BackendSource,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Resolve the effective backend selector.
///
/// Precedence, highest wins: non-empty environment value, non-empty config
/// value, the literal `"auto"`. Values are trimmed and lowercased before
/// comparison. No I/O happens here; the caller supplies both inputs.
pub fn resolve(env_value: Option<&str>, config_value: Option<&str>) -> KeyringBackendInfo {
    let env = env_value.map(normalize).unwrap_or_default();
    if !env.is_empty() {
        return KeyringBackendInfo {
            value: env,
            source: BackendSource::Env,
        };
    }

    let config = config_value.map(normalize).unwrap_or_default();
    if !config.is_empty() {
        return KeyringBackendInfo {
            value: config,
            source: BackendSource::Config,
        };
    }

    KeyringBackendInfo {
        value: "auto".to_string(),
        source: BackendSource::Default,
    }
}

/// Map a backend selector to the backends an open may attempt.
///
/// `""` and `"auto"` return an empty list, meaning unrestricted: the store
/// tries the native backend first and falls back to the encrypted file.
/// `"keychain"` and `"file"` restrict the attempt to exactly that backend.
/// Anything else is rejected before any backend is opened.
pub fn allowed(value: &str) -> Result<Vec<KeyringBackend>> {
    match normalize(value).as_str() {
        "" | "auto" => Ok(Vec::new()),
        "keychain" => Ok(vec![KeyringBackend::Keychain]),
        "file" => Ok(vec![KeyringBackend::File]),
        other => Err(CredentialError::InvalidBackend(other.to_string())),
    }
}

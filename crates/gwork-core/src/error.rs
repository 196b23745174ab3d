//! Credential error taxonomy and classification

use thiserror::Error;

/// OSStatus code for `errSecInteractionNotAllowed`, embedded in error text
/// when the macOS keychain refuses access until an interactive unlock.
pub(crate) const INTERACTION_NOT_ALLOWED_CODE: &str = "-25308";

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Caller input is malformed (empty email or refresh token); never retried
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Unrecognized backend identifier, rejected before any backend opens
    #[error("Unknown keyring backend {0:?}: expected \"auto\", \"keychain\" or \"file\"")]
    InvalidBackend(String),

    /// No entry exists for the given key
    #[error("Credential not found: {0}")]
    NotFound(String),

    /// The backend failed to open even after a recovery attempt
    #[error("Could not open keyring backend: {source}")]
    BackendUnavailable {
        /// The classified underlying open failure
        #[source]
        source: Box<CredentialError>,
    },

    /// The keychain needs an interactive unlock; the raw backend error is
    /// kept as the source so callers can still inspect it
    #[error("Keychain is locked. Run \"security unlock-keychain\" in a terminal and retry")]
    KeychainLocked {
        /// The original error carrying the lock signature
        #[source]
        source: Box<CredentialError>,
    },

    /// An interactive step was required but no terminal is attached
    #[error("No terminal available: {0}")]
    NoTty(String),

    /// The keychain unlock command reported failure
    #[error("Keychain unlock failed: {0}")]
    UnlockFailed(String),

    /// The file backend needs a password and no source supplied one
    #[error("A password is required for the file keyring backend: set GWORK_FILE_PASSWORD or run interactively")]
    PasswordRequired,

    /// Raw backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Encryption or decryption failure in the file backend
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Storage record (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Handle RwLock poison errors consistently
pub(crate) fn handle_lock_poison<T>(e: std::sync::PoisonError<T>) -> CredentialError {
    CredentialError::Backend(format!("Lock poisoned: {}", e))
}

/// Whether an error's text carries the keychain lock signature
pub(crate) fn is_lock_signature(err: &CredentialError) -> bool {
    err.to_string().contains(INTERACTION_NOT_ALLOWED_CODE)
}

/// Classify a raw backend error into an actionable one.
///
/// An error whose text carries the macOS interaction-not-allowed code is
/// replaced by [`CredentialError::KeychainLocked`], which displays unlock
/// guidance while keeping the original error reachable through `source()`.
/// Every other error is returned unchanged, message and all, so unrelated
/// failures are never obscured.
pub fn classify(err: CredentialError) -> CredentialError {
    if matches!(err, CredentialError::KeychainLocked { .. }) {
        return err;
    }
    if is_lock_signature(&err) {
        return CredentialError::KeychainLocked {
            source: Box::new(err),
        };
    }
    err
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn classify_leaves_unrelated_errors_untouched() {
        let err = classify(CredentialError::Backend("dbus timeout".to_string()));
        assert!(matches!(err, CredentialError::Backend(_)));
        assert_eq!(err.to_string(), "Backend error: dbus timeout");
        assert!(err.source().is_none());
    }

    #[test]
    fn classify_detects_lock_signature() {
        let raw = CredentialError::Backend(
            "Keyring error: Platform secure storage failure: Security error: -25308".to_string(),
        );
        let original_msg = raw.to_string();

        let classified = classify(raw);
        assert!(matches!(classified, CredentialError::KeychainLocked { .. }));
        // Displayed message changes to actionable guidance
        assert!(classified.to_string().contains("security unlock-keychain"));
        // The original error is still reachable for programmatic inspection
        assert_eq!(classified.source().unwrap().to_string(), original_msg);
    }

    #[test]
    fn classify_ignores_messages_without_the_code() {
        let err = classify(CredentialError::Backend("Security error: -25300".to_string()));
        assert!(matches!(err, CredentialError::Backend(_)));
    }

    #[test]
    fn classify_is_idempotent() {
        let raw = CredentialError::Backend("code -25308".to_string());
        let once = classify(raw);
        let twice = classify(once);
        assert!(matches!(twice, CredentialError::KeychainLocked { .. }));
        // Still a single level of wrapping
        let source = twice.source().unwrap();
        assert!(source.to_string().contains("-25308"));
        assert!(source.source().is_none());
    }
}

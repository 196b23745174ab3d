//! gwork-core - Credential storage for the gwork CLI
//!
//! Persists long-lived OAuth refresh tokens for multiple Google Workspace
//! accounts, keyed by normalized email, in the OS-native secret manager
//! with an encrypted-file fallback:
//! - macOS Keychain, Linux Secret Service, Windows Credential Manager
//!   (via the `keyring` crate)
//! - AES-256-GCM encrypted file fallback
//!
//! The backend is selected by an environment/config precedence chain, a
//! locked macOS keychain is unlocked interactively before it can fail a
//! read, and raw backend failures are classified into actionable errors.
//!
//! ## Security Features
//!
//! - **SecureString**: refresh tokens and passwords are wiped from memory
//!   on drop and redacted in Debug output
//! - **OS Keychains**: secret material is owned by platform-native storage
//! - The store never caches secret material beyond a single call

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod encrypted_file;
mod error;
mod keychain;
mod memory;
mod prompt;
mod recovery;
mod secure_string;
mod store;
mod token;


pub use backend::{allowed, resolve, BackendSource, KeyringBackend, KeyringBackendInfo};
pub use error::{classify, CredentialError, Result};
pub use recovery::{platform_recovery, MacosKeychainRecovery, NoopRecovery, PlatformRecovery};
pub use secure_string::SecureString;
pub use store::{CredentialStore, OpenOptions, ENV_FILE_PASSWORD, ENV_KEYRING_BACKEND};
pub use token::{
    normalize_email, parse_token_key, token_key, Token, DEFAULT_ACCOUNT_KEY, TOKEN_KEY_PREFIX,
};

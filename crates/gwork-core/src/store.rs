//! Credential store facade
//!
//! Opens one secret-storage backend according to the resolved selector and
//! exposes token and default-account CRUD over it. Failures pass through
//! the error classifier so a locked keychain reads as actionable guidance
//! instead of a raw platform code.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::backend::{self, BackendSource, KeyringBackend, KeyringBackendInfo};
use crate::encrypted_file::{self, EncryptedFileBackend};
use crate::error::{classify, is_lock_signature, CredentialError, Result};
use crate::keychain::KeychainBackend;
use crate::memory::MemoryBackend;
use crate::prompt;
use crate::recovery::{platform_recovery, PlatformRecovery};
use crate::secure_string::SecureString;
use crate::token::{self, StoredToken, Token, DEFAULT_ACCOUNT_KEY};

/// Environment variable selecting the keyring backend
pub const ENV_KEYRING_BACKEND: &str = "GWORK_KEYRING_BACKEND";

/// Environment variable supplying the file backend password
pub const ENV_FILE_PASSWORD: &str = "GWORK_FILE_PASSWORD";

/// Inputs for [`CredentialStore::open`].
///
/// All environment and config reading happens outside the resolver: the
/// caller (or [`OpenOptions::from_env`]) fetches raw values and hands them
/// over as plain strings.
#[derive(Default)]
pub struct OpenOptions {
    /// Raw backend selector from the environment, if set
    pub backend_env: Option<String>,
    /// Backend selector from the application config file, if set
    pub backend_config: Option<String>,
    /// Directory for the file backend; defaults to the per-user data dir
    pub file_dir: Option<PathBuf>,
    /// Explicitly supplied file-backend password, highest precedence
    pub file_password: Option<String>,
    /// File-backend password from the environment, second precedence
    pub file_password_env: Option<String>,
}

impl OpenOptions {
    /// Empty options: resolve to `"auto"` with default locations
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the backend selector and file password from the process
    /// environment. This is the one sanctioned place that touches
    /// environment variables.
    pub fn from_env() -> Self {
        Self {
            backend_env: std::env::var(ENV_KEYRING_BACKEND).ok(),
            file_password_env: std::env::var(ENV_FILE_PASSWORD).ok(),
            ..Self::default()
        }
    }

    /// Set the config-file backend selector
    #[must_use]
    pub fn with_config_value(mut self, value: impl Into<String>) -> Self {
        self.backend_config = Some(value.into());
        self
    }

    /// Set the environment backend selector
    #[must_use]
    pub fn with_env_value(mut self, value: impl Into<String>) -> Self {
        self.backend_env = Some(value.into());
        self
    }

    /// Set the file backend directory
    #[must_use]
    pub fn with_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    /// Set an explicit file backend password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.file_password = Some(password.into());
        self
    }
}

/// Resolve the file backend password.
///
/// Precedence: explicit value, then the environment value, then an
/// interactive prompt when a terminal is attached. Fails fast with
/// [`CredentialError::PasswordRequired`] in non-interactive contexts.
pub(crate) fn resolve_file_password(opts: &OpenOptions) -> Result<SecureString> {
    if let Some(pw) = opts.file_password.as_deref() {
        if !pw.is_empty() {
            return Ok(SecureString::new(pw));
        }
    }
    if let Some(pw) = opts.file_password_env.as_deref() {
        if !pw.is_empty() {
            return Ok(SecureString::new(pw));
        }
    }
    if prompt::stdin_is_tty() {
        return prompt::read_password("File keyring password:");
    }
    Err(CredentialError::PasswordRequired)
}

enum Backend {
    Keychain(KeychainBackend),
    File(EncryptedFileBackend),
    Memory(MemoryBackend),
}

impl Backend {
    fn kind(&self) -> KeyringBackend {
        match self {
            Self::Keychain(_) => KeyringBackend::Keychain,
            Self::File(_) => KeyringBackend::File,
            Self::Memory(_) => KeyringBackend::Memory,
        }
    }

    fn get(&self, key: &str) -> Result<SecureString> {
        match self {
            Self::Keychain(b) => b.get(key),
            Self::File(b) => b.get(key),
            Self::Memory(b) => b.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            Self::Keychain(b) => b.set(key, value),
            Self::File(b) => b.set(key, value),
            Self::Memory(b) => b.set(key, value),
        }
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self {
            Self::Keychain(b) => b.remove(key),
            Self::File(b) => b.remove(key),
            Self::Memory(b) => b.remove(key),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        match self {
            Self::Keychain(b) => b.keys(),
            Self::File(b) => b.keys(),
            Self::Memory(b) => b.keys(),
        }
    }
}

/// Per-user, per-service credential store
pub struct CredentialStore {
    backend: Backend,
    info: KeyringBackendInfo,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("backend", &self.backend.kind())
            .field("info", &self.info)
            .finish()
    }
}

impl CredentialStore {
    /// Open the store.
    ///
    /// Resolves and validates the backend selector, proactively unlocks a
    /// locked keychain when a native backend may be attempted, then opens
    /// the backends in precedence order. A lock discovered during the open
    /// itself triggers exactly one recovery-and-retry before the failure
    /// is classified and returned.
    pub fn open(opts: OpenOptions) -> Result<Self> {
        Self::open_with_recovery(opts, platform_recovery().as_ref())
    }

    pub(crate) fn open_with_recovery(
        opts: OpenOptions,
        recovery: &dyn PlatformRecovery,
    ) -> Result<Self> {
        let info = backend::resolve(opts.backend_env.as_deref(), opts.backend_config.as_deref());
        let allowed = backend::allowed(&info.value)?;

        let candidates = if allowed.is_empty() {
            // Unrestricted: the native backend first, then the file fallback
            vec![KeyringBackend::Keychain, KeyringBackend::File]
        } else {
            allowed
        };
        debug!(backend = %info.value, source = ?info.source, "Opening credential store");

        let restricted_to_keychain = candidates == [KeyringBackend::Keychain];
        if candidates.contains(&KeyringBackend::Keychain) {
            // Resolve a locked keychain up front instead of on first use.
            // With a file fallback available the unlock is best-effort.
            if let Err(e) = recovery.ensure_access() {
                if restricted_to_keychain {
                    return Err(classify(e));
                }
                warn!(error = %e, "Keychain recovery failed, relying on backend fallback");
            }
        }

        match Self::try_backends(&opts, &candidates) {
            Ok(backend) => {
                info!(backend = %backend.kind(), "Credential store opened");
                Ok(Self { backend, info })
            }
            Err(err) if is_lock_signature(&err) => {
                recovery.ensure_access().map_err(classify)?;
                match Self::try_backends(&opts, &candidates) {
                    Ok(backend) => {
                        info!(backend = %backend.kind(), "Credential store opened after unlock");
                        Ok(Self { backend, info })
                    }
                    Err(err) => Err(wrap_unavailable(err)),
                }
            }
            Err(err) => Err(wrap_unavailable(err)),
        }
    }

    fn try_backends(opts: &OpenOptions, candidates: &[KeyringBackend]) -> Result<Backend> {
        let mut last_err = None;
        for kind in candidates {
            match Self::open_backend(opts, *kind) {
                Ok(backend) => return Ok(backend),
                Err(e) => {
                    if candidates.len() > 1 {
                        warn!(backend = %kind, error = %e, "Backend failed to open, trying next");
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| CredentialError::Backend("No backend available".to_string())))
    }

    fn open_backend(opts: &OpenOptions, kind: KeyringBackend) -> Result<Backend> {
        match kind {
            KeyringBackend::Keychain => Ok(Backend::Keychain(KeychainBackend::open()?)),
            KeyringBackend::File => {
                let dir = match &opts.file_dir {
                    Some(dir) => dir.clone(),
                    None => encrypted_file::default_dir()?,
                };
                encrypted_file::ensure_dir(&dir)?;
                let password = resolve_file_password(opts)?;
                Ok(Backend::File(EncryptedFileBackend::open(&dir, &password)?))
            }
            KeyringBackend::Memory => Ok(Backend::Memory(MemoryBackend::new())),
        }
    }

    /// An in-memory store with the same CRUD surface, for tests that need
    /// no real secret manager
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(MemoryBackend::new()),
            info: KeyringBackendInfo {
                value: "memory".to_string(),
                source: BackendSource::Default,
            },
        }
    }

    /// The resolved backend selector and its provenance
    pub fn backend_info(&self) -> &KeyringBackendInfo {
        &self.info
    }

    /// The backend the store actually opened
    pub fn backend_kind(&self) -> KeyringBackend {
        self.backend.kind()
    }

    /// Store `token` under the normalized `email`, overwriting any
    /// existing entry. `created_at` is stamped with the current UTC time
    /// when unset.
    pub fn set_token(&self, email: &str, token: &Token) -> Result<()> {
        let email = token::normalize_email(email);
        if email.is_empty() {
            return Err(CredentialError::Validation(
                "email must not be empty".to_string(),
            ));
        }
        if token.refresh_token().trim().is_empty() {
            return Err(CredentialError::Validation(
                "refresh token must not be empty".to_string(),
            ));
        }

        let record = StoredToken::from_token(token);
        let payload = serde_json::to_string(&record)?;
        self.backend
            .set(&token::token_key(&email), &payload)
            .map_err(classify)?;

        info!(email = %email, "Stored account token");
        Ok(())
    }

    /// Fetch the token stored for `email`
    pub fn get_token(&self, email: &str) -> Result<Token> {
        let email = token::normalize_email(email);
        if email.is_empty() {
            return Err(CredentialError::Validation(
                "email must not be empty".to_string(),
            ));
        }

        let raw = self
            .backend
            .get(&token::token_key(&email))
            .map_err(classify)?;
        let record: StoredToken = serde_json::from_str(raw.expose())?;
        Ok(record.into_token(email))
    }

    /// Remove the token stored for `email`. Removing a missing entry
    /// surfaces the backend's own not-found semantics.
    pub fn delete_token(&self, email: &str) -> Result<()> {
        let email = token::normalize_email(email);
        if email.is_empty() {
            return Err(CredentialError::Validation(
                "email must not be empty".to_string(),
            ));
        }

        self.backend
            .remove(&token::token_key(&email))
            .map_err(classify)?;
        info!(email = %email, "Deleted account token");
        Ok(())
    }

    /// Whether a token is stored for `email`
    pub fn has_token(&self, email: &str) -> bool {
        self.get_token(email).is_ok()
    }

    /// Every stored token, sorted by normalized email.
    ///
    /// Keys outside the token scheme (including the default-account
    /// sentinel) are skipped; a read failure on any individual token fails
    /// the whole listing.
    pub fn list_tokens(&self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        for key in self.keys()? {
            let Some(email) = token::parse_token_key(&key) else {
                continue;
            };
            tokens.push(self.get_token(email)?);
        }
        tokens.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(tokens)
    }

    /// Raw enumeration of all backend key names, used by
    /// [`CredentialStore::list_tokens`] and diagnostics
    pub fn keys(&self) -> Result<Vec<String>> {
        self.backend.keys().map_err(classify)
    }

    /// Point the default account at `email`
    pub fn set_default_account(&self, email: &str) -> Result<()> {
        let email = token::normalize_email(email);
        if email.is_empty() {
            return Err(CredentialError::Validation(
                "email must not be empty".to_string(),
            ));
        }

        self.backend
            .set(DEFAULT_ACCOUNT_KEY, &email)
            .map_err(classify)?;
        info!(email = %email, "Set default account");
        Ok(())
    }

    /// The default account email, or an empty string when unset
    pub fn get_default_account(&self) -> Result<String> {
        match self.backend.get(DEFAULT_ACCOUNT_KEY) {
            Ok(value) => Ok(value.expose().to_string()),
            Err(CredentialError::NotFound(_)) => Ok(String::new()),
            Err(e) => Err(classify(e)),
        }
    }
}

fn wrap_unavailable(err: CredentialError) -> CredentialError {
    match err {
        e @ (CredentialError::Validation(_)
        | CredentialError::InvalidBackend(_)
        | CredentialError::PasswordRequired
        | CredentialError::NoTty(_)
        | CredentialError::UnlockFailed(_)) => e,
        other => CredentialError::BackendUnavailable {
            source: Box::new(classify(other)),
        },
    }
}

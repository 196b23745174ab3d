//! Platform recovery for locked secret managers
//!
//! macOS can refuse keychain access until the user unlocks it
//! interactively; other platforms either need no explicit unlock in this
//! tool's usage pattern or report lock state through the normal open/read
//! error path. The capability is selected at runtime by detected operating
//! system so the no-op path stays testable everywhere.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::{CredentialError, Result};
use crate::prompt;

/// Manual fallback shown whenever automatic recovery is impossible
const UNLOCK_HINT: &str = "run \"security unlock-keychain\" in a terminal, then retry";

/// Detects a locked secret manager and performs an interactive unlock
pub trait PlatformRecovery {
    /// Whether the platform secret manager currently refuses access.
    ///
    /// Probe failures count as locked: a spare unlock attempt is harmless,
    /// while a missed lock surfaces as a confusing downstream error.
    fn is_locked(&self) -> bool;

    /// Interactively unlock the secret manager
    fn unlock(&self) -> Result<()>;

    /// No-op when unlocked, otherwise a single unlock attempt
    fn ensure_access(&self) -> Result<()> {
        if self.is_locked() {
            self.unlock()
        } else {
            Ok(())
        }
    }
}

/// Recovery for the macOS login keychain via the `security` tool
pub struct MacosKeychainRecovery;

impl PlatformRecovery for MacosKeychainRecovery {
    fn is_locked(&self) -> bool {
        match Command::new("security").arg("show-keychain-info").output() {
            Ok(output) => {
                if !output.status.success() {
                    debug!("Keychain status query reported non-success, treating as locked");
                }
                !output.status.success()
            }
            Err(e) => {
                warn!(error = %e, "Keychain status query failed, treating as locked");
                true
            }
        }
    }

    fn unlock(&self) -> Result<()> {
        if !prompt::stdin_is_tty() {
            return Err(CredentialError::NoTty(format!(
                "Cannot unlock the keychain without a terminal; {}",
                UNLOCK_HINT
            )));
        }

        let password = prompt::read_password("Keychain password:")?;

        // The password travels over the child's stdin; putting it in argv
        // would expose it to `ps`.
        let mut child = Command::new("security")
            .arg("-i")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CredentialError::UnlockFailed(format!("Failed to run security: {}", e)))?;

        {
            let stdin = child.stdin.as_mut().ok_or_else(|| {
                CredentialError::UnlockFailed("Failed to open security stdin".to_string())
            })?;
            let escaped = password
                .expose()
                .replace('\\', "\\\\")
                .replace('"', "\\\"");
            writeln!(stdin, "unlock-keychain -p \"{}\"", escaped).map_err(|e| {
                CredentialError::UnlockFailed(format!("Failed to send password: {}", e))
            })?;
        }

        let status = child
            .wait()
            .map_err(|e| CredentialError::UnlockFailed(format!("Failed to run security: {}", e)))?;

        if !status.success() {
            // Wrong password and any other cause look the same here
            return Err(CredentialError::UnlockFailed(UNLOCK_HINT.to_string()));
        }

        debug!("Keychain unlocked");
        Ok(())
    }
}

/// No-op recovery for platforms without an explicit unlock step
pub struct NoopRecovery;

impl PlatformRecovery for NoopRecovery {
    fn is_locked(&self) -> bool {
        false
    }

    fn unlock(&self) -> Result<()> {
        Ok(())
    }
}

/// Pick the recovery implementation for the running operating system
pub fn platform_recovery() -> Box<dyn PlatformRecovery> {
    recovery_for(std::env::consts::OS)
}

/// Runtime factory, split out so every variant is reachable from tests on
/// any platform
pub(crate) fn recovery_for(os: &str) -> Box<dyn PlatformRecovery> {
    match os {
        "macos" => Box::new(MacosKeychainRecovery),
        _ => Box::new(NoopRecovery),
    }
}

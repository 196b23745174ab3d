//! Interactive prompt helpers
//!
//! Prompts are only offered when stdin is a real terminal; non-interactive
//! contexts (scripts, CI) must fail fast instead of blocking on input.

use std::io::IsTerminal;

use inquire::{Password, PasswordDisplayMode};

use crate::error::{CredentialError, Result};
use crate::secure_string::SecureString;

/// Whether an interactive terminal is attached to stdin
pub(crate) fn stdin_is_tty() -> bool {
    std::io::stdin().is_terminal()
}

/// Read a password with echo disabled.
///
/// Callers must check [`stdin_is_tty`] first; this blocks on user input.
pub(crate) fn read_password(message: &str) -> Result<SecureString> {
    Password::new(message)
        .with_display_mode(PasswordDisplayMode::Hidden)
        .without_confirmation()
        .prompt()
        .map(SecureString::new)
        .map_err(|e| CredentialError::Backend(format!("Password prompt failed: {}", e)))
}

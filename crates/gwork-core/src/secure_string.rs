//! Secret container with cryptographic memory wiping

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that is cryptographically cleared from memory when dropped.
///
/// Refresh tokens and backend passwords travel through this type so they
/// are overwritten with zeros before deallocation and never show up in
/// `Debug` or `Display` output.
///
/// # Example
///
/// ```
/// use gwork_core::SecureString;
///
/// let secret = SecureString::new("1//refresh-token");
/// assert_eq!(secret.expose(), "1//refresh-token");
///
/// // Debug output is redacted
/// let debug = format!("{:?}", secret);
/// assert!(!debug.contains("refresh-token"));
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Wrap a secret value
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Temporarily expose the secret.
    ///
    /// The returned reference should stay in as narrow a scope as possible
    /// and must not be cloned into long-lived storage.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length of the secret in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecureString([REDACTED, {} bytes])", self.inner.len())
    }
}

impl std::fmt::Display for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

// Constant-time comparison so equality checks cannot leak timing info
impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        self.inner.as_bytes().ct_eq(other.inner.as_bytes()).into()
    }
}

impl Eq for SecureString {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_debug_and_display() {
        let secret = SecureString::new("my-refresh-token");
        assert_eq!(secret.expose(), "my-refresh-token");
        assert_eq!(secret.len(), 16);
        assert!(!secret.is_empty());

        let debug = format!("{:?}", secret);
        assert!(!debug.contains("my-refresh-token"));
        assert!(debug.contains("REDACTED"));

        let display = format!("{}", secret);
        assert!(!display.contains("my-refresh-token"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn constant_time_equality() {
        let a = SecureString::new("token-value");
        let b = SecureString::new("token-value");
        let c = SecureString::new("other-value");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn clone_preserves_value() {
        let original = SecureString::new("clone-me");
        let cloned = original.clone();
        assert_eq!(original.expose(), cloned.expose());
    }
}

//! Account tokens and their storage keys

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::secure_string::SecureString;

/// Prefix for per-account token entries
pub const TOKEN_KEY_PREFIX: &str = "token:";

/// Reserved key holding the default-account pointer, disjoint from the
/// token-key scheme
pub const DEFAULT_ACCOUNT_KEY: &str = "default-account";

/// Lowercase and trim an email for use as a storage key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Build the storage key for a normalized email
pub fn token_key(email: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, email)
}

/// Extract the email from a token storage key.
///
/// Returns `None` for keys outside the token scheme (including the
/// default-account sentinel) and for keys whose suffix is empty after
/// trimming.
pub fn parse_token_key(key: &str) -> Option<&str> {
    let email = key.strip_prefix(TOKEN_KEY_PREFIX)?.trim();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

/// A stored OAuth refresh credential for one account.
///
/// The refresh token itself lives in a private [`SecureString`] field so it
/// is redacted from `Debug` output and wiped on drop; it is reachable only
/// through [`Token::refresh_token`].
#[derive(Debug, Clone)]
pub struct Token {
    /// Normalized account email, the store's primary key
    pub email: String,
    /// Service identifiers this token was granted for (e.g. "gmail");
    /// insertion order does not matter for equality
    pub services: Vec<String>,
    /// Granted OAuth scopes, in grant order
    pub scopes: Vec<String>,
    /// When the credential was stored; filled at write time if unset
    pub created_at: Option<DateTime<Utc>>,
    refresh_token: SecureString,
}

impl Token {
    /// Create a token for `email` holding `refresh_token`.
    ///
    /// The email is normalized on construction.
    pub fn new(email: impl AsRef<str>, refresh_token: impl Into<String>) -> Self {
        Self {
            email: normalize_email(email.as_ref()),
            services: Vec::new(),
            scopes: Vec::new(),
            created_at: None,
            refresh_token: SecureString::new(refresh_token),
        }
    }

    /// Set the granted services
    #[must_use]
    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    /// Set the granted scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the creation timestamp
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// The secret refresh token
    #[must_use]
    pub fn refresh_token(&self) -> &str {
        self.refresh_token.expose()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        let mut ours = self.services.clone();
        let mut theirs = other.services.clone();
        ours.sort();
        theirs.sort();

        self.email == other.email
            && ours == theirs
            && self.scopes == other.scopes
            && self.created_at == other.created_at
            && self.refresh_token == other.refresh_token
    }
}

impl Eq for Token {}

/// The record shape actually written to a backend.
///
/// Kept separate from [`Token`] so the secret field can never ride along
/// into a public or display representation by accident; the store converts
/// between the two at its boundary.
#[derive(Serialize, Deserialize)]
pub(crate) struct StoredToken {
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Build the storage record, stamping `created_at` if the token has none
    pub(crate) fn from_token(token: &Token) -> Self {
        Self {
            refresh_token: token.refresh_token().to_string(),
            services: token.services.clone(),
            scopes: token.scopes.clone(),
            created_at: Some(token.created_at.unwrap_or_else(Utc::now)),
        }
    }

    /// Rehydrate a public token under its normalized email
    pub(crate) fn into_token(self, email: String) -> Token {
        Token {
            email,
            services: self.services,
            scopes: self.scopes,
            created_at: self.created_at,
            refresh_token: SecureString::new(self.refresh_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn parses_token_keys() {
        assert_eq!(parse_token_key("token:a@b.com"), Some("a@b.com"));
        assert_eq!(parse_token_key("token:"), None);
        assert_eq!(parse_token_key("token:   "), None);
        assert_eq!(parse_token_key(DEFAULT_ACCOUNT_KEY), None);
        assert_eq!(parse_token_key("other:a@b.com"), None);
    }

    #[test]
    fn token_key_round_trips() {
        let key = token_key("a@b.com");
        assert_eq!(key, "token:a@b.com");
        assert_eq!(parse_token_key(&key), Some("a@b.com"));
    }

    #[test]
    fn debug_never_shows_the_refresh_token() {
        let token = Token::new("a@b.com", "super-secret-rt");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("super-secret-rt"));
        assert!(debug.contains("a@b.com"));
    }

    #[test]
    fn service_order_does_not_affect_equality() {
        let a = Token::new("a@b.com", "rt")
            .with_services(vec!["gmail".to_string(), "calendar".to_string()]);
        let b = Token::new("a@b.com", "rt")
            .with_services(vec!["calendar".to_string(), "gmail".to_string()]);
        assert_eq!(a, b);
    }

    #[test]
    fn stored_token_stamps_created_at() {
        let token = Token::new("a@b.com", "rt");
        let record = StoredToken::from_token(&token);
        assert!(record.created_at.is_some());

        let fixed = Utc.with_ymd_and_hms(2025, 12, 12, 0, 0, 0).unwrap();
        let record = StoredToken::from_token(&token.with_created_at(fixed));
        assert_eq!(record.created_at, Some(fixed));
    }

    #[test]
    fn stored_token_serde_skips_empty_fields() {
        let record = StoredToken {
            refresh_token: "rt".to_string(),
            services: Vec::new(),
            scopes: Vec::new(),
            created_at: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"refresh_token":"rt"}"#);

        let parsed: StoredToken = serde_json::from_str(&json).unwrap();
        assert!(parsed.services.is_empty());
        assert!(parsed.created_at.is_none());
    }
}

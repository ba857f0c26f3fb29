//! Authentication identities and the store keys derived from them.
//!
//! Tokens are namespaced by base URL, client ID and email so switching
//! between accounts or environments never reuses the wrong credentials.

/// Prefix shared by every token key this crate reads or writes.
pub const TOKEN_KEY_PREFIX: &str = "oauth-token";

/// Separator between identity fields inside a key.
pub const KEY_SEPARATOR: char = '|';

/// The authentication context a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Identity {
    pub base_url: String,
    pub client_id: String,
    pub email: String,
}

impl Identity {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            email: email.into(),
        }
    }

    /// Canonical form used for key derivation.
    ///
    /// The base URL is trimmed, lower-cased and loses any trailing `/`; the
    /// email is trimmed and lower-cased. The client ID is opaque and kept
    /// byte-for-byte.
    pub fn normalize(&self) -> Identity {
        Identity {
            base_url: normalize_base_url(&self.base_url),
            client_id: self.client_id.clone(),
            email: normalize_email(&self.email),
        }
    }

    pub fn has_email(&self) -> bool {
        !normalize_email(&self.email).is_empty()
    }
}

fn normalize_base_url(base_url: &str) -> String {
    base_url
        .trim()
        .to_lowercase()
        .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
        .to_string()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical cache key: `oauth-token:<base>|<client_id>|<email>`.
pub fn cache_key(identity: &Identity) -> String {
    let id = identity.normalize();
    format!(
        "{TOKEN_KEY_PREFIX}:{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
        id.base_url, id.client_id, id.email
    )
}

// ============================================================================
// Tests
// ============================================================================

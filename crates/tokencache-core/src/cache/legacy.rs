//! Recovery of tokens written under older key shapes.
//!
//! Runs only after the canonical key misses. Every tier either finds exactly
//! one candidate or gives up; with two or more candidates we cannot tell
//! which account a token belongs to, so nothing is returned.

use tracing::debug;

use crate::identity::{Identity, KEY_SEPARATOR, TOKEN_KEY_PREFIX};
use crate::store::SecureStore;
use crate::utils::mask_key;

/// Key shapes earlier releases wrote for a base URL and email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyShape {
    /// `oauth-token:<base>||<email>` (empty client ID)
    EmptyClient,
    /// `oauth-token:<base>|<email>`
    BaseAndEmail,
    /// `oauth-token:<email>`
    BareEmail,
}

impl LegacyShape {
    pub const ALL: [LegacyShape; 3] = [
        LegacyShape::EmptyClient,
        LegacyShape::BaseAndEmail,
        LegacyShape::BareEmail,
    ];

    /// Build the key for a normalized identity.
    pub fn key(self, id: &Identity) -> String {
        match self {
            LegacyShape::EmptyClient => format!(
                "{TOKEN_KEY_PREFIX}:{}{KEY_SEPARATOR}{KEY_SEPARATOR}{}",
                id.base_url, id.email
            ),
            LegacyShape::BaseAndEmail => {
                format!("{TOKEN_KEY_PREFIX}:{}{KEY_SEPARATOR}{}", id.base_url, id.email)
            }
            LegacyShape::BareEmail => format!("{TOKEN_KEY_PREFIX}:{}", id.email),
        }
    }
}

/// One rung of the fallback ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Email unknown: the single key under `<base>|<client_id>|`.
    AnyEmail,
    /// Email known: a fixed legacy shape.
    Shape(LegacyShape),
    /// Email known: the single key `<base>|<any client>|<email>`.
    AnyClient,
}

impl Strategy {
    /// Strategies tried, in order, for an identity.
    pub fn ladder(id: &Identity) -> Vec<Strategy> {
        if !id.has_email() {
            return vec![Strategy::AnyEmail];
        }
        LegacyShape::ALL
            .into_iter()
            .map(Strategy::Shape)
            .chain(std::iter::once(Strategy::AnyClient))
            .collect()
    }

    fn attempt(self, store: &dyn SecureStore, id: &Identity) -> Option<String> {
        match self {
            Strategy::AnyEmail => {
                let prefix = format!(
                    "{TOKEN_KEY_PREFIX}:{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}",
                    id.base_url, id.client_id
                );
                unique_match(store, |key| key.starts_with(&prefix))
            }
            Strategy::Shape(shape) => {
                let key = shape.key(id);
                match store.get(&key) {
                    Ok(_) => Some(key),
                    Err(e) => {
                        if !e.is_not_found() {
                            debug!(key = %mask_key(&key), error = %e, "legacy key lookup failed");
                        }
                        None
                    }
                }
            }
            Strategy::AnyClient => {
                let prefix = format!("{TOKEN_KEY_PREFIX}:{}{KEY_SEPARATOR}", id.base_url);
                let suffix = format!("{KEY_SEPARATOR}{}", id.email);
                unique_match(store, |key| {
                    key.strip_prefix(&prefix)
                        .and_then(|rest| rest.strip_suffix(&suffix))
                        .is_some_and(|client| !client.contains(KEY_SEPARATOR))
                })
            }
        }
    }
}

/// Where a token was recovered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub key: String,
    pub strategy: Strategy,
}

/// Search for an alternate key holding this identity's token.
///
/// `id` must already be normalized. Returns `None` when nothing, or more
/// than one thing, matches.
pub fn resolve(store: &dyn SecureStore, id: &Identity) -> Option<Resolution> {
    for strategy in Strategy::ladder(id) {
        if let Some(key) = strategy.attempt(store, id) {
            debug!(key = %mask_key(&key), ?strategy, "recovered token from legacy key");
            return Some(Resolution { key, strategy });
        }
    }
    debug!("no legacy key matched");
    None
}

fn unique_match<F>(store: &dyn SecureStore, is_candidate: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let keys = match store.keys() {
        Ok(keys) => keys,
        Err(e) => {
            debug!(error = %e, "listing store keys failed");
            return None;
        }
    };

    let mut candidates = keys.into_iter().filter(|k| is_candidate(k.as_str()));
    let first = candidates.next()?;
    if candidates.next().is_some() {
        debug!("multiple legacy keys matched, refusing to guess");
        return None;
    }
    Some(first)
}

// ============================================================================
// Tests
// ============================================================================

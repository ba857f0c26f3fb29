use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};

use tokencache_core::utils::{format_remaining, mask_key, mask_secret};
use tokencache_core::{Identity, StoreOpener, TokenCache};

pub const USAGE: &str = "\
Usage: tokencache <command>

Commands:
  status <base-url> <client-id> <email> [user-id]   Show the cached token for an identity
  save <base-url> <client-id> <email> <token> <ttl-secs> [user-id]
                                                    Cache a token (for testing logins)
  clear <base-url> <client-id> <email>              Remove the cached token
  keys                                              List stored token keys
  backend                                           Show which secure store is in use

Environment:
  EIGHTCTL_KEYRING_BACKEND     auto | native | file
  EIGHTCTL_KEYRING_DIR         directory for the encrypted file store
  EIGHTCTL_KEYRING_PASSPHRASE  passphrase for the encrypted file store
  RUST_LOG                     log filter (e.g. debug)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status {
        identity: Identity,
        user_id: Option<String>,
    },
    Save {
        identity: Identity,
        token: String,
        ttl_secs: i64,
        user_id: Option<String>,
    },
    Clear {
        identity: Identity,
    },
    Keys,
    Backend,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("missing command"))?;
        let identity = |rest: &[String]| Identity::new(&rest[0], &rest[1], &rest[2]);

        match (name.as_str(), rest.len()) {
            ("status", 3 | 4) => Ok(Command::Status {
                identity: identity(rest),
                user_id: rest.get(3).cloned(),
            }),
            ("save", 5 | 6) => Ok(Command::Save {
                identity: identity(rest),
                token: rest[3].clone(),
                ttl_secs: rest[4]
                    .parse()
                    .with_context(|| format!("invalid ttl-secs '{}'", rest[4]))?,
                user_id: rest.get(5).cloned(),
            }),
            ("clear", 3) => Ok(Command::Clear {
                identity: identity(rest),
            }),
            ("keys", 0) => Ok(Command::Keys),
            ("backend", 0) => Ok(Command::Backend),
            ("status" | "save" | "clear" | "keys" | "backend", _) => {
                Err(anyhow::anyhow!("wrong number of arguments for '{}'", name))
            }
            _ => Err(anyhow::anyhow!("unknown command '{}'", name)),
        }
    }

    pub fn run<O: StoreOpener>(&self, cache: &TokenCache<O>, out: &mut impl Write) -> Result<()> {
        match self {
            Command::Status { identity, user_id } => {
                match cache.load(identity, user_id.as_deref()) {
                    Ok(cached) => {
                        writeln!(out, "token:   {}", mask_secret(&cached.token))?;
                        writeln!(
                            out,
                            "expires: {} ({})",
                            cached.expires_at.to_rfc3339(),
                            format_remaining(cached.time_until_expiry())
                        )?;
                        if let Some(ref owner) = cached.user_id {
                            writeln!(out, "user:    {}", owner)?;
                        }
                    }
                    Err(e) if e.is_not_found() => writeln!(out, "no usable cached token")?,
                    Err(e) => return Err(e).context("Failed to read token cache"),
                }
            }
            Command::Save {
                identity,
                token,
                ttl_secs,
                user_id,
            } => {
                let expires_at = expiry_after(*ttl_secs)?;
                cache
                    .save(identity, token, expires_at, user_id.as_deref())
                    .context("Failed to save token")?;
                writeln!(out, "saved, expires {}", format_remaining(expires_at - Utc::now()))?;
            }
            Command::Clear { identity } => {
                cache.clear(identity).context("Failed to clear token")?;
                writeln!(out, "cleared")?;
            }
            Command::Keys => {
                let keys = cache.keys().context("Failed to list keys")?;
                if keys.is_empty() {
                    writeln!(out, "no stored keys")?;
                }
                for key in keys {
                    writeln!(out, "{}", mask_key(&key))?;
                }
            }
            Command::Backend => {
                let kind = cache.backend().context("No secure store available")?;
                writeln!(out, "{}", kind)?;
            }
        }
        Ok(())
    }
}

/// Absolute expiry `ttl_secs` from now, rejecting values chrono cannot represent.
fn expiry_after(ttl_secs: i64) -> Result<DateTime<Utc>> {
    Duration::try_seconds(ttl_secs)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("ttl-secs {} out of range", ttl_secs))
}

// ============================================================================
// Tests
// ============================================================================

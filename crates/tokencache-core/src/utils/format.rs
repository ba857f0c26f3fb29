use chrono::Duration;

use crate::identity::{KEY_SEPARATOR, TOKEN_KEY_PREFIX};

/// Mask a secret for display, keeping a short prefix and suffix
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{prefix}***{suffix}")
}

/// Mask the email segment of a token key so logs don't carry addresses.
/// `oauth-token:https://api|client|me@x.com` -> `oauth-token:https://api|client|m***`
pub fn mask_key(key: &str) -> String {
    let Some(rest) = key.strip_prefix(TOKEN_KEY_PREFIX).and_then(|r| r.strip_prefix(':')) else {
        return truncate_string(key, 48);
    };
    let (head, email) = match rest.rfind(KEY_SEPARATOR) {
        Some(pos) => rest.split_at(pos + 1),
        None => ("", rest),
    };
    let masked = match email.chars().next() {
        Some(first) => format!("{first}***"),
        None => String::new(),
    };
    format!("{TOKEN_KEY_PREFIX}:{head}{masked}")
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Human-friendly time remaining, e.g. "in 2h 5m" or "expired 3m ago"
pub fn format_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes();
    if minutes < 0 {
        return format!("expired {} ago", format_span(-minutes));
    }
    if minutes == 0 {
        return if remaining.num_seconds() >= 0 {
            "in under a minute".to_string()
        } else {
            "expired just now".to_string()
        };
    }
    format!("in {}", format_span(minutes))
}

fn format_span(minutes: i64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        let remaining_mins = minutes % 60;
        if remaining_mins == 0 {
            format!("{}h", minutes / 60)
        } else {
            format!("{}h {}m", minutes / 60, remaining_mins)
        }
    } else {
        format!("{}d {}h", minutes / 1440, (minutes % 1440) / 60)
    }
}

//! Access guard for catalog mutations.
//!
//! The caller asserts an identity through the `user_email` body field or the
//! `x-user-email` header. It is compared case-sensitively with the configured
//! administrator email. There is no session or token behind the claim, so this
//! gate only keeps honest clients out.

use axum::http::HeaderMap;
use serde_json::Value;
use tracing::warn;

use crate::config::Config;
use crate::errors::{MarketError, Result};

pub const ACTOR_HEADER: &str = "x-user-email";
const ACTOR_BODY_FIELD: &str = "user_email";

/// The claimed actor: the body field wins, the header is the fallback.
///
/// A body that is not a JSON object carries no claim.
pub fn claimed_actor(headers: &HeaderMap, body: Option<&Value>) -> Option<String> {
    let from_body = body
        .and_then(|b| b.get(ACTOR_BODY_FIELD))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let from_header = || {
        headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
    };
    from_body.or_else(from_header).map(str::to_string)
}

/// Allow only when the claimed actor equals `config.admin_email`.
pub fn authorize(config: &Config, claimed: Option<&str>) -> Result<()> {
    match claimed {
        Some(actor) if actor == config.admin_email => Ok(()),
        _ => {
            warn!(
                "Unauthorized catalog access attempt by: {}",
                claimed.unwrap_or("<anonymous>")
            );
            Err(MarketError::AccessDenied)
        }
    }
}

/// Run the guard against a raw request. The body is parsed leniently so the
/// guard always runs before any body validation.
pub fn require_admin(config: &Config, headers: &HeaderMap, body: &[u8]) -> Result<Option<Value>> {
    let parsed = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<Value>(body).ok()
    };
    let claimed = claimed_actor(headers, parsed.as_ref());
    authorize(config, claimed.as_deref())?;
    Ok(parsed)
}

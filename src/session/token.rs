use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::role::UserRole;

/// Token pair returned by `/auth/login` and `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
    pub role: UserRole,
    /// The backend may send the org id as a number; it is kept as text.
    #[serde(default, deserialize_with = "lenient_org_id")]
    pub org_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

fn bearer() -> String { "bearer".to_string() }

pub(crate) fn lenient_org_id<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Expiry of a JWT-shaped access token, read from its `exp` claim.
/// Opaque tokens and malformed payloads yield `None`.
pub fn access_token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let mut parts = token.split('.');
    let (_header, payload, _sig) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() { return None; }
    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&raw).ok()?;
    let exp = claims.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

/// True when the token carries an `exp` claim at or before `now`.
pub fn is_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    access_token_expiry(token).map(|exp| exp <= now).unwrap_or(false)
}

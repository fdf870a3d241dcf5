//! JWT claims, token types and the issued token pair.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Caller-defined data embedded in every token under `extend`.
pub type Extend = Map<String, Value>;

/// Which of the two tokens is being handled.
///
/// Selects both the key slot and the lifetime that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token authorizing API calls
    Access,
    /// Long-lived token used only to mint a new pair
    Refresh,
}

impl Default for TokenType {
    fn default() -> Self {
        Self::Access
    }
}

impl TokenType {
    /// Lowercase name used in key slots and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Caller-defined extension data
    #[serde(deserialize_with = "deserialize_extend")]
    pub extend: Extend,
    /// Additional top-level claims (`sub`, `aud`, `nbf`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Create new claims issued at `now`.
    pub fn new(issuer: impl Into<String>, now: i64, expires_in_secs: i64, extend: Extend) -> Self {
        Self {
            iss: issuer.into(),
            iat: now,
            exp: now.saturating_add(expires_in_secs),
            extend,
            extra: Map::new(),
        }
    }

    /// Check if the claims have expired.
    pub fn is_expired(&self) -> bool {
        now_timestamp() > self.exp
    }

    /// Seconds until `exp`. Negative once the token has expired.
    pub fn remaining_secs(&self) -> i64 {
        self.exp - now_timestamp()
    }

    /// Look up an `extend` field.
    pub fn extend_value(&self, key: &str) -> Option<&Value> {
        self.extend.get(key)
    }
}

// Some issuers serialize an empty map as `[]`.
fn deserialize_extend<'de, D>(deserializer: D) -> Result<Extend, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        other => Err(serde::de::Error::custom(format!(
            "extend must be an object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Issued tokens returned by generation and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Signed access token
    pub access_token: String,
    /// Absent when refresh tokens are disabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// The only token type issued.
    pub const BEARER: &'static str = "Bearer";

    /// Create a bearer token pair.
    pub fn new(expires_in: i64, access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            token_type: Self::BEARER.to_string(),
            expires_in,
            access_token,
            refresh_token,
        }
    }
}

/// Current Unix timestamp in seconds.
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_flatten_extra_fields() {
        let value = json!({
            "iss": "issuer",
            "iat": 100,
            "exp": 200,
            "sub": "user-1",
            "extend": {"uid": 7}
        });
        let claims: Claims = serde_json::from_value(value).unwrap();
        assert_eq!(claims.iss, "issuer");
        assert_eq!(claims.extend_value("uid"), Some(&json!(7)));
        assert_eq!(claims.extra.get("sub"), Some(&json!("user-1")));
        assert!(!claims.extra.contains_key("extend"));
    }

    #[test]
    fn test_empty_array_extend_is_empty_map() {
        let value = json!({"iss": "i", "iat": 1, "exp": 2, "extend": []});
        let claims: Claims = serde_json::from_value(value).unwrap();
        assert!(claims.extend.is_empty());
    }

    #[test]
    fn test_missing_or_scalar_extend_is_rejected() {
        let missing = json!({"iss": "i", "iat": 1, "exp": 2});
        assert!(serde_json::from_value::<Claims>(missing).is_err());

        let scalar = json!({"iss": "i", "iat": 1, "exp": 2, "extend": "uid"});
        let err = serde_json::from_value::<Claims>(scalar).unwrap_err();
        assert!(err.to_string().contains("extend must be an object"));
    }

    #[test]
    fn test_remaining_secs() {
        let now = now_timestamp();
        let claims = Claims::new("issuer", now, 3600, Extend::new());
        assert!(!claims.is_expired());
        let remaining = claims.remaining_secs();
        assert!(remaining <= 3600 && remaining > 3590);

        let expired = Claims::new("issuer", now - 7200, 3600, Extend::new());
        assert!(expired.is_expired());
        assert!(expired.remaining_secs() < 0);
    }

    #[test]
    fn test_token_pair_omits_absent_refresh_token() {
        let pair = TokenPair::new(7200, "a.b.c".to_string(), None);
        let value = serde_json::to_value(&pair).unwrap();
        assert_eq!(value["token_type"], "Bearer");
        assert_eq!(value["expires_in"], 7200);
        assert!(value.get("refresh_token").is_none());
    }
}

//! Access and refresh claim construction.

use error::TokenError;
use serde_json::{Map, Value};

use crate::claims::{Claims, Extend};
use crate::config::JwtConfig;

/// Claim names owned by the payload builder.
///
/// Issued tokens never carry `nbf`; they are valid from `iat`.
pub const RESERVED_CLAIMS: [&str; 5] = ["iss", "iat", "exp", "nbf", "extend"];

/// Claims for one issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct Payloads {
    /// Claims of the access token
    pub access: Claims,
    /// Claims of the refresh token, identical apart from `exp`
    pub refresh: Claims,
}

/// Build the access and refresh claims issued at `now`.
///
/// Both share `iss`, `iat`, `extend` and any extra top-level claims; only
/// `exp` differs. Reserved claim names in `extra` are ignored. Fails with
/// [`TokenError::Config`] if an expiry does not fit in a timestamp.
pub fn build_payloads(
    config: &JwtConfig,
    extend: &Extend,
    extra: &Map<String, Value>,
    now: i64,
) -> Result<Payloads, TokenError> {
    let access_exp = expiry(now, config.access_exp, "access_exp")?;
    let refresh_exp = expiry(now, config.refresh_exp, "refresh_exp")?;

    let access = Claims {
        iss: config.issuer.clone(),
        iat: now,
        exp: access_exp,
        extend: extend.clone(),
        extra: extra
            .iter()
            .filter(|(key, _)| !RESERVED_CLAIMS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    };

    let refresh = Claims {
        exp: refresh_exp,
        ..access.clone()
    };

    Ok(Payloads { access, refresh })
}

fn expiry(now: i64, lifetime: i64, name: &str) -> Result<i64, TokenError> {
    now.checked_add(lifetime).ok_or_else(|| {
        tracing::error!("{} of {} seconds overflows the expiry timestamp", name, lifetime);
        TokenError::Config(format!("{} is too large", name))
    })
}

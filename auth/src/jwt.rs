//! JWT encoding and decoding utilities.
//!
//! A thin layer over `jsonwebtoken` whose job is to turn its errors into
//! the small [`CodecError`] surface the verifier classifies.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::claims::{now_timestamp, Claims};
use crate::config::Algorithm;
use crate::keys::KeyMaterial;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("signature verification failed")]
    BadSignature,

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token has expired")]
    Expired,

    #[error("malformed claims: {0}")]
    MalformedClaims(String),

    #[error("unusable key: {0}")]
    Key(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),
}

impl From<jsonwebtoken::errors::Error> for CodecError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::BadSignature,
            ErrorKind::ImmatureSignature => Self::NotYetValid,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                Self::MalformedClaims(err.to_string())
            }
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey => {
                Self::Key(err.to_string())
            }
            _ => Self::Decode(err.to_string()),
        }
    }
}

/// Encode claims into a signed JWT.
pub fn encode_token(claims: &Claims, key: KeyMaterial<'_>, algorithm: Algorithm) -> Result<String, CodecError> {
    let encoding_key = match key {
        KeyMaterial::Secret(secret) => EncodingKey::from_secret(secret),
        KeyMaterial::RsaPem(pem) => EncodingKey::from_rsa_pem(pem).map_err(|e| {
            tracing::error!("Failed to load RSA signing key: {}", e);
            CodecError::Key(e.to_string())
        })?,
    };

    jsonwebtoken::encode(&Header::new(algorithm.to_jwt_algorithm()), claims, &encoding_key).map_err(|e| {
        tracing::error!("Failed to encode JWT: {}", e);
        CodecError::Encode(e.to_string())
    })
}

/// Decode and validate a JWT, returning its raw claim set.
///
/// `leeway` seconds of clock skew are tolerated on `exp`, `nbf` and `iat`.
/// The token header must name `algorithm`.
pub fn decode_token(
    token: &str,
    key: KeyMaterial<'_>,
    algorithm: Algorithm,
    leeway: u64,
) -> Result<Map<String, Value>, CodecError> {
    let decoding_key = match key {
        KeyMaterial::Secret(secret) => DecodingKey::from_secret(secret),
        KeyMaterial::RsaPem(pem) => DecodingKey::from_rsa_pem(pem).map_err(|e| {
            tracing::error!("Failed to load RSA verification key: {}", e);
            CodecError::Key(e.to_string())
        })?,
    };

    let mut validation = Validation::new(algorithm.to_jwt_algorithm());
    validation.leeway = leeway;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let data = jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|e| {
        tracing::debug!("Failed to decode JWT: {}", e);
        CodecError::from(e)
    })?;

    // jsonwebtoken does not look at iat.
    if let Some(iat) = data.claims.get("iat").and_then(Value::as_i64) {
        let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);
        if iat > now_timestamp().saturating_add(leeway) {
            tracing::debug!("JWT issued in the future: iat={}", iat);
            return Err(CodecError::NotYetValid);
        }
    }

    Ok(data.claims)
}

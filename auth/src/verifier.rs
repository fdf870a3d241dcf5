//! Token verification and failure classification.

use error::TokenError;
use serde_json::Value;

use crate::claims::{Claims, TokenType};
use crate::config::JwtConfig;
use crate::jwt::{decode_token, CodecError};
use crate::keys::{KeyRole, KeyScheme};

/// Optional revocation check run after a token verified successfully.
///
/// Return `Err` with a reason to reject the token.
pub trait TokenBlacklist: Send + Sync {
    /// Called with the raw token and its verified claims.
    fn check(&self, token: &str, token_type: TokenType, claims: &Claims) -> Result<(), String>;
}

/// Verifies tokens against one loaded configuration.
pub struct Verifier<'a> {
    config: &'a JwtConfig,
    blacklist: Option<&'a dyn TokenBlacklist>,
}

impl<'a> Verifier<'a> {
    /// Create a verifier without a blacklist.
    pub fn new(config: &'a JwtConfig) -> Self {
        Self {
            config,
            blacklist: None,
        }
    }

    /// Set the revocation check, if any.
    pub fn with_blacklist(mut self, blacklist: Option<&'a dyn TokenBlacklist>) -> Self {
        self.blacklist = blacklist;
        self
    }

    /// Verify a token of the given type and return its claims.
    ///
    /// Expiry is reported as [`TokenError::TokenExpired`] for access tokens
    /// and [`TokenError::RefreshTokenExpired`] for refresh tokens. Every other
    /// failure is [`TokenError::InvalidToken`].
    pub fn verify(&self, token: &str, token_type: TokenType) -> Result<Claims, TokenError> {
        let key = KeyScheme::from_config(self.config)
            .resolve(token_type, KeyRole::Verify)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))?;

        let raw = decode_token(token, key, self.config.algorithm, self.config.leeway)
            .map_err(|e| classify(e, token_type))?;

        // Round-trip through a neutral value so `extend` is always a plain map.
        let claims: Claims = serde_json::from_value(Value::Object(raw)).map_err(|e| {
            tracing::warn!("Rejected {} token with malformed claims: {}", token_type, e);
            TokenError::InvalidToken(format!("expected extension field missing: {}", e))
        })?;

        if let Some(blacklist) = self.blacklist {
            blacklist.check(token, token_type, &claims).map_err(|reason| {
                tracing::warn!("Rejected blacklisted {} token: {}", token_type, reason);
                TokenError::InvalidToken(reason)
            })?;
        }

        tracing::debug!("Verified {} token issued by {}", token_type, claims.iss);
        Ok(claims)
    }
}

fn classify(err: CodecError, token_type: TokenType) -> TokenError {
    tracing::warn!("Rejected {} token: {}", token_type, err);
    match err {
        CodecError::BadSignature => TokenError::InvalidToken(format!("invalid {} token", token_type)),
        CodecError::NotYetValid => {
            TokenError::InvalidToken(format!("{} token not yet active", token_type))
        }
        CodecError::Expired => match token_type {
            TokenType::Access => TokenError::TokenExpired,
            TokenType::Refresh => TokenError::RefreshTokenExpired,
        },
        CodecError::MalformedClaims(msg) => {
            TokenError::InvalidToken(format!("expected extension field missing: {}", msg))
        }
        other => TokenError::InvalidToken(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{now_timestamp, Extend};
    use crate::config::Algorithm;
    use crate::jwt::encode_token;
    use crate::keys::KeyMaterial;
    use serde_json::{json, Map};

    fn config() -> JwtConfig {
        JwtConfig::hmac("issuer", Algorithm::HS256, "access-secret", "refresh-secret")
    }

    fn sign(value: Value, secret: &[u8]) -> String {
        jsonwebtoken::encode(
            &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
            &value,
            &jsonwebtoken::EncodingKey::from_secret(secret),
        )
        .unwrap()
    }

    fn expired(secret: &[u8]) -> String {
        let now = now_timestamp();
        let claims = Claims::new("issuer", now - 7200, 3600, Extend::new());
        encode_token(&claims, KeyMaterial::Secret(secret), Algorithm::HS256).unwrap()
    }

    #[test]
    fn test_expired_is_classified_per_token_type() {
        let config = config();
        let verifier = Verifier::new(&config);

        assert_eq!(
            verifier.verify(&expired(b"access-secret"), TokenType::Access).unwrap_err(),
            TokenError::TokenExpired
        );
        assert_eq!(
            verifier.verify(&expired(b"refresh-secret"), TokenType::Refresh).unwrap_err(),
            TokenError::RefreshTokenExpired
        );
    }

    #[test]
    fn test_token_type_keys_are_not_interchangeable() {
        let config = config();
        let now = now_timestamp();
        let token = sign(
            json!({"iss": "issuer", "iat": now, "exp": now + 60, "extend": {}}),
            b"refresh-secret",
        );

        let verifier = Verifier::new(&config);
        assert!(verifier.verify(&token, TokenType::Refresh).is_ok());
        assert_eq!(
            verifier.verify(&token, TokenType::Access).unwrap_err(),
            TokenError::InvalidToken("invalid access token".into())
        );
    }

    #[test]
    fn test_missing_extend_is_invalid_token() {
        let config = config();
        let now = now_timestamp();
        let token = sign(json!({"iss": "issuer", "iat": now, "exp": now + 60}), b"access-secret");

        match Verifier::new(&config).verify(&token, TokenType::Access) {
            Err(TokenError::InvalidToken(msg)) => {
                assert!(msg.starts_with("expected extension field missing"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_key_is_invalid_token() {
        let mut config = config();
        config.refresh_secret_key = None;
        let err = Verifier::new(&config).verify("a.b.c", TokenType::Refresh).unwrap_err();
        assert_eq!(
            err,
            TokenError::InvalidToken("Configuration error: refresh_secret_key is not configured".into())
        );
    }

    struct DenyAll;

    impl TokenBlacklist for DenyAll {
        fn check(&self, _token: &str, _token_type: TokenType, _claims: &Claims) -> Result<(), String> {
            Err("token revoked".to_string())
        }
    }

    #[test]
    fn test_blacklist_rejects_valid_token() {
        let config = config();
        let now = now_timestamp();
        let claims = Claims::new("issuer", now, 60, Map::new());
        let token = encode_token(&claims, KeyMaterial::Secret(b"access-secret"), Algorithm::HS256).unwrap();

        let verifier = Verifier::new(&config).with_blacklist(Some(&DenyAll));
        assert_eq!(
            verifier.verify(&token, TokenType::Access).unwrap_err(),
            TokenError::InvalidToken("token revoked".into())
        );
    }
}

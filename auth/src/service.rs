//! Token service: issuance, verification and refresh-token rotation.

use std::sync::Arc;

use error::TokenError;
use serde_json::{Map, Value};

use crate::claims::{now_timestamp, Claims, Extend, TokenPair, TokenType};
use crate::config::{check_lifetime, ConfigSource, JwtConfig};
use crate::header::{extract_bearer_token, HeaderSource};
use crate::jwt::encode_token;
use crate::keys::{KeyRole, KeyScheme};
use crate::payload::{build_payloads, Payloads};
use crate::verifier::{TokenBlacklist, Verifier};

/// `extend` keys that override the configured lifetimes for one issuance.
const ACCESS_EXP_OVERRIDE: &str = "access_exp";
const REFRESH_EXP_OVERRIDE: &str = "refresh_exp";

/// Stateless token service.
///
/// Configuration is loaded from the injected [`ConfigSource`] on every call.
/// When an operation is not given a token explicitly it is read from the
/// injected [`HeaderSource`].
#[derive(Clone)]
pub struct TokenService {
    config: Arc<dyn ConfigSource>,
    headers: Option<Arc<dyn HeaderSource>>,
    blacklist: Option<Arc<dyn TokenBlacklist>>,
}

impl TokenService {
    /// Create a new token service.
    pub fn new<C: ConfigSource + 'static>(config: C) -> Self {
        Self {
            config: Arc::new(config),
            headers: None,
            blacklist: None,
        }
    }

    /// Set where the `Authorization` header is read from.
    pub fn with_header_source<H: HeaderSource + 'static>(mut self, headers: H) -> Self {
        self.headers = Some(Arc::new(headers));
        self
    }

    /// Reject tokens the blacklist reports as revoked.
    pub fn with_blacklist<B: TokenBlacklist + 'static>(mut self, blacklist: B) -> Self {
        self.blacklist = Some(Arc::new(blacklist));
        self
    }

    /// Issue a new token pair carrying `extend`.
    ///
    /// `extend.access_exp` and `extend.refresh_exp` override the configured
    /// lifetimes for this call and are bounded like configured lifetimes.
    /// Keys of `override_payload` other than `iss`, `iat`, `exp`, `nbf` and
    /// `extend` become extra top-level claims.
    pub fn generate(&self, extend: &Extend, override_payload: &Map<String, Value>) -> Result<TokenPair, TokenError> {
        let mut config = self.load_config()?;
        apply_lifetime_overrides(&mut config, extend)?;

        let payloads = build_payloads(&config, extend, override_payload, now_timestamp())?;
        let pair = self.issue(&config, &payloads)?;

        tracing::debug!(
            "Issued {} token pair for issuer {}",
            if pair.refresh_token.is_some() { "access+refresh" } else { "access-only" },
            config.issuer
        );
        Ok(pair)
    }

    /// Verify a token of the given type.
    pub fn verify(&self, token_type: TokenType, token: Option<&str>) -> Result<Claims, TokenError> {
        let token = self.resolve_token(token)?;
        let config = self.load_config()?;
        self.verifier(&config).verify(&token, token_type)
    }

    /// Verify an access token.
    pub fn verify_access(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        self.verify(TokenType::Access, token)
    }

    /// Verify a refresh token.
    pub fn verify_refresh(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        self.verify(TokenType::Refresh, token)
    }

    /// Exchange a valid refresh token for a new pair.
    ///
    /// The new tokens carry the old `extend` and get fresh `iat`/`exp`
    /// values from the current configuration. An expired refresh token fails
    /// with [`TokenError::RefreshTokenExpired`].
    pub fn refresh(&self, token: Option<&str>) -> Result<TokenPair, TokenError> {
        let token = self.resolve_token(token)?;
        let config = self.load_config()?;

        let claims = self.verifier(&config).verify(&token, TokenType::Refresh)?;

        let payloads = build_payloads(&config, &claims.extend, &Map::new(), now_timestamp())?;
        let pair = self.issue(&config, &payloads)?;

        tracing::debug!("Rotated token pair for issuer {}", config.issuer);
        Ok(pair)
    }

    /// The `extend` map of a verified token.
    pub fn get_extend(&self, token_type: TokenType, token: Option<&str>) -> Result<Extend, TokenError> {
        Ok(self.verify(token_type, token)?.extend)
    }

    /// One `extend` value of a verified token, or `""` if the key is absent.
    pub fn get_claim_value(&self, key: &str, token_type: TokenType, token: Option<&str>) -> Result<Value, TokenError> {
        let mut extend = self.get_extend(token_type, token)?;
        Ok(extend.remove(key).unwrap_or_else(|| Value::String(String::new())))
    }

    /// Seconds until a verified token expires.
    ///
    /// Can be negative when called right at the expiry boundary.
    pub fn get_remaining_seconds(&self, token_type: TokenType, token: Option<&str>) -> Result<i64, TokenError> {
        Ok(self.verify(token_type, token)?.remaining_secs())
    }

    /// The raw bearer token of the current request.
    pub fn get_token(&self) -> Result<String, TokenError> {
        self.token_from_headers()
    }

    fn load_config(&self) -> Result<JwtConfig, TokenError> {
        self.config.load().map_err(|e| {
            tracing::error!("Failed to load JWT configuration: {}", e);
            e
        })
    }

    fn verifier<'a>(&'a self, config: &'a JwtConfig) -> Verifier<'a> {
        Verifier::new(config).with_blacklist(self.blacklist.as_deref())
    }

    fn resolve_token(&self, token: Option<&str>) -> Result<String, TokenError> {
        match token {
            Some(token) => Ok(token.to_string()),
            None => self.token_from_headers(),
        }
    }

    fn token_from_headers(&self) -> Result<String, TokenError> {
        let header = self.headers.as_ref().and_then(|h| h.authorization());
        extract_bearer_token(header.as_deref()).map(str::to_string)
    }

    fn issue(&self, config: &JwtConfig, payloads: &Payloads) -> Result<TokenPair, TokenError> {
        let access_token = sign(config, &payloads.access, TokenType::Access)?;
        let refresh_token = if config.refresh_disable {
            None
        } else {
            Some(sign(config, &payloads.refresh, TokenType::Refresh)?)
        };

        Ok(TokenPair::new(config.access_exp, access_token, refresh_token))
    }
}

fn sign(config: &JwtConfig, claims: &Claims, token_type: TokenType) -> Result<String, TokenError> {
    let key = KeyScheme::from_config(config).resolve(token_type, KeyRole::Sign)?;
    encode_token(claims, key, config.algorithm).map_err(|e| {
        tracing::error!("Failed to sign {} token: {}", token_type, e);
        TokenError::TokenCreationFailed(e.to_string())
    })
}

fn apply_lifetime_overrides(config: &mut JwtConfig, extend: &Extend) -> Result<(), TokenError> {
    if let Some(secs) = lifetime_override(extend, ACCESS_EXP_OVERRIDE)? {
        config.access_exp = secs;
    }
    if let Some(secs) = lifetime_override(extend, REFRESH_EXP_OVERRIDE)? {
        config.refresh_exp = secs;
    }
    Ok(())
}

fn lifetime_override(extend: &Extend, key: &str) -> Result<Option<i64>, TokenError> {
    let secs = match extend.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };

    match secs {
        Some(secs) => check_lifetime(key, secs).map(|()| Some(secs)),
        None => Err(TokenError::Config(format!(
            "{} override must be a positive number of seconds",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;
    use serde_json::json;

    fn extend(value: Value) -> Extend {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_lifetime_overrides() {
        let mut config = JwtConfig::hmac("issuer", Algorithm::HS256, "a", "r");
        apply_lifetime_overrides(&mut config, &extend(json!({"access_exp": 60, "refresh_exp": "120"}))).unwrap();
        assert_eq!(config.access_exp, 60);
        assert_eq!(config.refresh_exp, 120);

        apply_lifetime_overrides(&mut config, &extend(json!({"access_exp": null}))).unwrap();
        assert_eq!(config.access_exp, 60);
    }

    #[test]
    fn test_invalid_lifetime_override() {
        let mut config = JwtConfig::hmac("issuer", Algorithm::HS256, "a", "r");
        for bad in [json!(0), json!(-5), json!("soon"), json!(1.5), json!([60]), json!(i64::MAX)] {
            let err = apply_lifetime_overrides(&mut config, &extend(json!({"access_exp": bad}))).unwrap_err();
            assert!(matches!(err, TokenError::Config(_)));
        }
    }

    #[test]
    fn test_generate_uses_override_lifetime() {
        let service = TokenService::new(JwtConfig::hmac("issuer", Algorithm::HS256, "a", "r"));
        let pair = service
            .generate(&extend(json!({"uid": 1, "access_exp": 90})), &Map::new())
            .unwrap();
        assert_eq!(pair.expires_in, 90);

        let claims = service.verify_access(Some(&pair.access_token)).unwrap();
        assert_eq!(claims.exp - claims.iat, 90);
        assert_eq!(claims.extend["access_exp"], 90);
    }

    #[test]
    fn test_huge_lifetime_override_is_config_error() {
        let service = TokenService::new(JwtConfig::hmac("issuer", Algorithm::HS256, "a", "r"));
        for key in ["access_exp", "refresh_exp"] {
            let mut overrides = Extend::new();
            overrides.insert(key.to_string(), json!(i64::MAX));
            let err = service.generate(&overrides, &Map::new()).unwrap_err();
            assert_eq!(
                err,
                TokenError::Config(format!("{} must not exceed 315360000 seconds", key))
            );
        }
    }

    #[test]
    fn test_signing_failure_is_token_creation_error() {
        let config = JwtConfig::rsa("issuer", Algorithm::RS256, "bad", "bad", "bad", "bad");
        let err = TokenService::new(config).generate(&Extend::new(), &Map::new()).unwrap_err();
        assert!(matches!(err, TokenError::TokenCreationFailed(_)));
    }

    #[test]
    fn test_service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TokenService>();
    }
}

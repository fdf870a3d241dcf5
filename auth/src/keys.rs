//! Signing and verification key selection.

use error::TokenError;

use crate::claims::TokenType;
use crate::config::{JwtConfig, KeyFamily};

/// Whether a key is needed to sign or to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// Issuing a token
    Sign,
    /// Checking a presented token
    Verify,
}

/// Raw key material handed to the codec.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum KeyMaterial<'a> {
    /// HMAC shared secret
    Secret(&'a [u8]),
    /// PEM encoded RSA key, private for signing and public for verifying
    RsaPem(&'a [u8]),
}

impl std::fmt::Debug for KeyMaterial<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Secret(_) => f.write_str("Secret(..)"),
            KeyMaterial::RsaPem(_) => f.write_str("RsaPem(..)"),
        }
    }
}

/// PEM key pair for one token type.
#[derive(Debug, Clone, Copy, Default)]
pub struct RsaKeyPair<'a> {
    /// Signing key
    pub private_pem: Option<&'a str>,
    /// Verification key
    pub public_pem: Option<&'a str>,
}

/// Key slots of the configured algorithm family.
#[derive(Debug, Clone, Copy)]
pub enum KeyScheme<'a> {
    /// HMAC secrets, one per token type
    Symmetric {
        access: Option<&'a str>,
        refresh: Option<&'a str>,
    },
    /// RSA key pairs, one per token type
    Rsa {
        access: RsaKeyPair<'a>,
        refresh: RsaKeyPair<'a>,
    },
}

impl<'a> KeyScheme<'a> {
    /// Borrow the key slots matching the configured algorithm.
    pub fn from_config(config: &'a JwtConfig) -> Self {
        match config.algorithm.family() {
            KeyFamily::Hmac => KeyScheme::Symmetric {
                access: config.access_secret_key.as_deref(),
                refresh: config.refresh_secret_key.as_deref(),
            },
            KeyFamily::Rsa => KeyScheme::Rsa {
                access: RsaKeyPair {
                    private_pem: config.access_private_key.as_deref(),
                    public_pem: config.access_public_key.as_deref(),
                },
                refresh: RsaKeyPair {
                    private_pem: config.refresh_private_key.as_deref(),
                    public_pem: config.refresh_public_key.as_deref(),
                },
            },
        }
    }

    /// Select the key for a token type and role.
    ///
    /// Symmetric schemes sign and verify with the same secret. RSA schemes
    /// sign with the private key and verify with the public key.
    pub fn resolve(&self, token_type: TokenType, role: KeyRole) -> Result<KeyMaterial<'a>, TokenError> {
        match *self {
            KeyScheme::Symmetric { access, refresh } => {
                let secret = match token_type {
                    TokenType::Access => access,
                    TokenType::Refresh => refresh,
                };
                present(secret, token_type, "secret_key").map(|s| KeyMaterial::Secret(s.as_bytes()))
            }
            KeyScheme::Rsa { access, refresh } => {
                let pair = match token_type {
                    TokenType::Access => access,
                    TokenType::Refresh => refresh,
                };
                let (pem, slot) = match role {
                    KeyRole::Sign => (pair.private_pem, "private_key"),
                    KeyRole::Verify => (pair.public_pem, "public_key"),
                };
                present(pem, token_type, slot).map(|p| KeyMaterial::RsaPem(p.as_bytes()))
            }
        }
    }
}

fn present<'a>(key: Option<&'a str>, token_type: TokenType, slot: &str) -> Result<&'a str, TokenError> {
    match key {
        Some(key) if !key.is_empty() => Ok(key),
        _ => {
            tracing::error!("Missing {}_{} in JWT configuration", token_type, slot);
            Err(TokenError::Config(format!("{}_{} is not configured", token_type, slot)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;

    fn rsa_config() -> JwtConfig {
        JwtConfig::rsa(
            "issuer",
            Algorithm::RS256,
            "access-private",
            "access-public",
            "refresh-private",
            "refresh-public",
        )
    }

    #[test]
    fn test_symmetric_sign_and_verify_share_secret() {
        let config = JwtConfig::hmac("issuer", Algorithm::HS256, "access-secret", "refresh-secret");
        let scheme = KeyScheme::from_config(&config);

        for role in [KeyRole::Sign, KeyRole::Verify] {
            assert_eq!(
                scheme.resolve(TokenType::Access, role).unwrap(),
                KeyMaterial::Secret(b"access-secret")
            );
            assert_eq!(
                scheme.resolve(TokenType::Refresh, role).unwrap(),
                KeyMaterial::Secret(b"refresh-secret")
            );
        }
    }

    #[test]
    fn test_rsa_selects_private_for_sign_and_public_for_verify() {
        let config = rsa_config();
        let scheme = KeyScheme::from_config(&config);

        assert_eq!(
            scheme.resolve(TokenType::Access, KeyRole::Sign).unwrap(),
            KeyMaterial::RsaPem(b"access-private")
        );
        assert_eq!(
            scheme.resolve(TokenType::Access, KeyRole::Verify).unwrap(),
            KeyMaterial::RsaPem(b"access-public")
        );
        assert_eq!(
            scheme.resolve(TokenType::Refresh, KeyRole::Sign).unwrap(),
            KeyMaterial::RsaPem(b"refresh-private")
        );
        assert_eq!(
            scheme.resolve(TokenType::Refresh, KeyRole::Verify).unwrap(),
            KeyMaterial::RsaPem(b"refresh-public")
        );
    }

    #[test]
    fn test_rsa_algorithm_ignores_secrets() {
        let mut config = rsa_config();
        config.access_secret_key = Some("unused".to_string());
        config.access_public_key = None;

        let err = KeyScheme::from_config(&config)
            .resolve(TokenType::Access, KeyRole::Verify)
            .unwrap_err();
        assert_eq!(err, TokenError::Config("access_public_key is not configured".into()));
    }

    #[test]
    fn test_missing_refresh_secret_is_config_error() {
        let mut config = JwtConfig::hmac("issuer", Algorithm::HS512, "access-secret", "");
        assert!(matches!(
            KeyScheme::from_config(&config).resolve(TokenType::Refresh, KeyRole::Sign),
            Err(TokenError::Config(_))
        ));

        config.refresh_secret_key = None;
        assert!(matches!(
            KeyScheme::from_config(&config).resolve(TokenType::Refresh, KeyRole::Verify),
            Err(TokenError::Config(_))
        ));
    }
}

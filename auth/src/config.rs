//! Token service configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use error::TokenError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signing algorithms accepted in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// HMAC with SHA-256
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
    /// RSA PKCS#1 v1.5 with SHA-256
    RS256,
    /// RSA PKCS#1 v1.5 with SHA-384
    RS384,
    /// RSA PKCS#1 v1.5 with SHA-512
    RS512,
}

/// Key material scheme an algorithm needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// Shared secret, same key signs and verifies
    Hmac,
    /// PEM key pair, private key signs and public key verifies
    Rsa,
}

impl Algorithm {
    /// Key material scheme this algorithm signs with.
    pub fn family(self) -> KeyFamily {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => KeyFamily::Hmac,
            Self::RS256 | Self::RS384 | Self::RS512 => KeyFamily::Rsa,
        }
    }

    /// Converts to the `jsonwebtoken` Algorithm type.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::HS256 => jsonwebtoken::Algorithm::HS256,
            Self::HS384 => jsonwebtoken::Algorithm::HS384,
            Self::HS512 => jsonwebtoken::Algorithm::HS512,
            Self::RS256 => jsonwebtoken::Algorithm::RS256,
            Self::RS384 => jsonwebtoken::Algorithm::RS384,
            Self::RS512 => jsonwebtoken::Algorithm::RS512,
        }
    }

    /// Name as written in configuration and the JWT header.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            other => Err(TokenError::Config(format!("unsupported algorithm: {}", other))),
        }
    }
}

/// JWT configuration.
///
/// Field names on the wire follow the configuration contract (`iss`,
/// `algorithms`, `access_exp`, ...).
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Token issuer
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Signing algorithm
    #[serde(rename = "algorithms")]
    pub algorithm: Algorithm,
    /// Access token lifetime in seconds
    pub access_exp: i64,
    /// Refresh token lifetime in seconds
    pub refresh_exp: i64,
    /// Clock skew tolerance in seconds
    #[serde(default)]
    pub leeway: u64,
    /// Issue access tokens only
    #[serde(default)]
    pub refresh_disable: bool,
    /// HMAC secret for access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_secret_key: Option<String>,
    /// HMAC secret for refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_secret_key: Option<String>,
    /// PEM public key verifying access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_public_key: Option<String>,
    /// PEM private key signing access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_private_key: Option<String>,
    /// PEM public key verifying refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_public_key: Option<String>,
    /// PEM private key signing refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_private_key: Option<String>,
}

// Key material stays out of Debug output.
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("algorithm", &self.algorithm)
            .field("access_exp", &self.access_exp)
            .field("refresh_exp", &self.refresh_exp)
            .field("leeway", &self.leeway)
            .field("refresh_disable", &self.refresh_disable)
            .finish_non_exhaustive()
    }
}

impl JwtConfig {
    /// Create an HMAC configuration with separate access and refresh secrets.
    pub fn hmac(
        issuer: impl Into<String>,
        algorithm: Algorithm,
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Self {
        Self {
            access_secret_key: Some(access_secret.into()),
            refresh_secret_key: Some(refresh_secret.into()),
            ..Self::empty(issuer.into(), algorithm)
        }
    }

    /// Create an RSA configuration from PEM encoded key pairs.
    pub fn rsa(
        issuer: impl Into<String>,
        algorithm: Algorithm,
        access_private_pem: impl Into<String>,
        access_public_pem: impl Into<String>,
        refresh_private_pem: impl Into<String>,
        refresh_public_pem: impl Into<String>,
    ) -> Self {
        Self {
            access_private_key: Some(access_private_pem.into()),
            access_public_key: Some(access_public_pem.into()),
            refresh_private_key: Some(refresh_private_pem.into()),
            refresh_public_key: Some(refresh_public_pem.into()),
            ..Self::empty(issuer.into(), algorithm)
        }
    }

    fn empty(issuer: String, algorithm: Algorithm) -> Self {
        Self {
            issuer,
            algorithm,
            access_exp: Self::DEFAULT_ACCESS_EXP,
            refresh_exp: Self::DEFAULT_REFRESH_EXP,
            leeway: 0,
            refresh_disable: false,
            access_secret_key: None,
            refresh_secret_key: None,
            access_public_key: None,
            access_private_key: None,
            refresh_public_key: None,
            refresh_private_key: None,
        }
    }

    pub const DEFAULT_ACCESS_EXP: i64 = 7200;
    pub const DEFAULT_REFRESH_EXP: i64 = 604_800;
    /// Longest accepted token lifetime (ten years).
    pub const MAX_LIFETIME: i64 = 10 * 365 * 86_400;
    /// Largest accepted clock skew tolerance (one day).
    pub const MAX_LEEWAY: u64 = 86_400;

    /// Set the token lifetimes in seconds.
    pub fn with_lifetimes(mut self, access_exp: i64, refresh_exp: i64) -> Self {
        self.access_exp = access_exp;
        self.refresh_exp = refresh_exp;
        self
    }

    /// Set the clock skew tolerance.
    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.leeway = secs;
        self
    }

    /// Disable refresh token issuance.
    pub fn with_refresh_disabled(mut self, disabled: bool) -> Self {
        self.refresh_disable = disabled;
        self
    }

    /// Parse the configuration mapping.
    ///
    /// `null` or an empty object means no configuration was provided.
    pub fn from_value(value: Value) -> Result<Self, TokenError> {
        match &value {
            Value::Null => return Err(missing_config()),
            Value::Object(map) if map.is_empty() => return Err(missing_config()),
            _ => {}
        }

        let config: Self = serde_json::from_value(value)
            .map_err(|e| TokenError::Config(format!("invalid JWT configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    ///
    /// The contract keys may sit at the top level or under a `jwt` object.
    pub fn from_file(path: &Path) -> Result<Self, TokenError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TokenError::Config(format!("cannot read JWT configuration {}: {}", path.display(), e))
        })?;
        let mut document: Value = serde_json::from_str(&content).map_err(|e| {
            TokenError::Config(format!("cannot parse JWT configuration {}: {}", path.display(), e))
        })?;

        let value = match document.get_mut("jwt") {
            Some(nested) => nested.take(),
            None => document,
        };
        Self::from_value(value)
    }

    /// Create configuration from environment variables named
    /// `<prefix>ISS`, `<prefix>ALGORITHMS`, `<prefix>ACCESS_EXP`, ...
    pub fn from_env(prefix: &str) -> Result<Self, TokenError> {
        let var = |name: &str| {
            std::env::var(format!("{}{}", prefix, name))
                .ok()
                .filter(|v| !v.is_empty())
        };

        let issuer = var("ISS").ok_or_else(|| {
            TokenError::Config(format!("{}ISS is not set; JWT configuration does not exist", prefix))
        })?;
        let algorithm: Algorithm = match var("ALGORITHMS") {
            Some(alg) => alg.parse()?,
            None => Algorithm::HS256,
        };

        let mut config = Self::empty(issuer, algorithm);

        if let Some(exp) = var("ACCESS_EXP") {
            config.access_exp = parse_env_number(prefix, "ACCESS_EXP", &exp)?;
        }
        if let Some(exp) = var("REFRESH_EXP") {
            config.refresh_exp = parse_env_number(prefix, "REFRESH_EXP", &exp)?;
        }
        if let Some(leeway) = var("LEEWAY") {
            config.leeway = parse_env_number(prefix, "LEEWAY", &leeway)?;
        }
        if let Some(disable) = var("REFRESH_DISABLE") {
            config.refresh_disable = disable.to_lowercase() == "true" || disable == "1";
        }

        config.access_secret_key = var("ACCESS_SECRET_KEY");
        config.refresh_secret_key = var("REFRESH_SECRET_KEY");
        config.access_public_key = var("ACCESS_PUBLIC_KEY");
        config.access_private_key = var("ACCESS_PRIVATE_KEY");
        config.refresh_public_key = var("REFRESH_PUBLIC_KEY");
        config.refresh_private_key = var("REFRESH_PRIVATE_KEY");

        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the token core relies on.
    ///
    /// The key scheme matching the algorithm family must be populated. Refresh
    /// key material is not required while refresh tokens are disabled.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.issuer.trim().is_empty() {
            return Err(TokenError::Config("iss must not be empty".to_string()));
        }
        check_lifetime("access_exp", self.access_exp)?;
        check_lifetime("refresh_exp", self.refresh_exp)?;
        if self.leeway > Self::MAX_LEEWAY {
            return Err(TokenError::Config(format!(
                "leeway must not exceed {} seconds",
                Self::MAX_LEEWAY
            )));
        }

        let required: Vec<(&str, &Option<String>)> = match self.algorithm.family() {
            KeyFamily::Hmac => vec![
                ("access_secret_key", &self.access_secret_key),
                ("refresh_secret_key", &self.refresh_secret_key),
            ],
            KeyFamily::Rsa => vec![
                ("access_private_key", &self.access_private_key),
                ("access_public_key", &self.access_public_key),
                ("refresh_private_key", &self.refresh_private_key),
                ("refresh_public_key", &self.refresh_public_key),
            ],
        };

        for (name, value) in required {
            if self.refresh_disable && name.starts_with("refresh_") {
                continue;
            }
            if value.as_deref().map_or(true, str::is_empty) {
                return Err(TokenError::Config(format!(
                    "{} is required for {}",
                    name, self.algorithm
                )));
            }
        }

        Ok(())
    }
}

/// Reject lifetimes that are not positive or exceed [`JwtConfig::MAX_LIFETIME`].
pub(crate) fn check_lifetime(name: &str, secs: i64) -> Result<(), TokenError> {
    if secs <= 0 {
        return Err(TokenError::Config(format!("{} must be positive", name)));
    }
    if secs > JwtConfig::MAX_LIFETIME {
        return Err(TokenError::Config(format!(
            "{} must not exceed {} seconds",
            name,
            JwtConfig::MAX_LIFETIME
        )));
    }
    Ok(())
}

fn missing_config() -> TokenError {
    TokenError::Config("JWT configuration does not exist".to_string())
}

fn parse_env_number<T: FromStr>(prefix: &str, name: &str, raw: &str) -> Result<T, TokenError> {
    raw.trim().parse().map_err(|_| {
        TokenError::Config(format!("{}{} must be a number, got {:?}", prefix, name, raw))
    })
}

/// Supplies configuration to the token service.
///
/// Called once per operation, so implementations may pick up changes
/// between calls.
pub trait ConfigSource: Send + Sync {
    /// Load and validate the current configuration.
    fn load(&self) -> Result<JwtConfig, TokenError>;
}

impl ConfigSource for JwtConfig {
    fn load(&self) -> Result<JwtConfig, TokenError> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// Reads configuration from environment variables on every load.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    pub const DEFAULT_PREFIX: &'static str = "JWT_";

    /// Read variables named `JWT_ISS`, `JWT_ALGORITHMS`, ...
    pub fn new() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }

    /// Read variables under a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for EnvConfig {
    fn load(&self) -> Result<JwtConfig, TokenError> {
        JwtConfig::from_env(&self.prefix)
    }
}

/// Reads configuration from a JSON file on every load.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    /// Read from the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The configuration file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfig {
    fn load(&self) -> Result<JwtConfig, TokenError> {
        JwtConfig::from_file(&self.path)
    }
}

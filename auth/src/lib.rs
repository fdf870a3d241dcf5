//! Access/refresh JWT issuance and verification.
//!
//! This crate issues signed, time-bounded token pairs carrying caller data
//! under the `extend` claim, verifies presented tokens with typed failures,
//! and rotates a pair from a valid refresh token.
//!
//! ```no_run
//! use jwt_token::{Algorithm, Extend, JwtConfig, TokenService};
//!
//! let config = JwtConfig::hmac("my-app", Algorithm::HS256, "access-secret", "refresh-secret");
//! let service = TokenService::new(config);
//!
//! let mut extend = Extend::new();
//! extend.insert("uid".into(), 42.into());
//!
//! let pair = service.generate(&extend, &Default::default())?;
//! let claims = service.verify_access(Some(&pair.access_token))?;
//! assert_eq!(claims.extend["uid"], 42);
//! # Ok::<(), jwt_token::TokenError>(())
//! ```

mod claims;
mod config;
mod header;
mod jwt;
mod keys;
mod payload;
mod service;
mod verifier;

pub use claims::{now_timestamp, Claims, Extend, TokenPair, TokenType};
pub use config::{Algorithm, ConfigSource, EnvConfig, FileConfig, JwtConfig, KeyFamily};
pub use header::{extract_bearer_token, HeaderSource, StaticHeader};
pub use jwt::{decode_token, encode_token, CodecError};
pub use keys::{KeyMaterial, KeyRole, KeyScheme, RsaKeyPair};
pub use payload::{build_payloads, Payloads, RESERVED_CLAIMS};
pub use service::TokenService;
pub use verifier::{TokenBlacklist, Verifier};

pub use error::{ErrorResponse, TokenError};

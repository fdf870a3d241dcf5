//! Common error types for the token service.
//!
//! Every failure the token core can produce is a variant of [`TokenError`],
//! so callers branch on the variant instead of parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Configuration is missing or inconsistent. Not retryable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No token was presented.
    #[error("Missing token: {0}")]
    MissingToken(String),

    /// The `Authorization` header is structurally invalid.
    #[error("Malformed authorization header: {0}")]
    MalformedHeader(String),

    /// Bad signature, not yet active, malformed claims, or any other
    /// verification failure.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Access token expired; the caller should use the refresh flow.
    #[error("Access token expired")]
    TokenExpired,

    /// Refresh token expired; the caller must authenticate again.
    #[error("Refresh token expired")]
    RefreshTokenExpired,

    /// Signing failed, usually because the key could not be parsed.
    #[error("Token creation failed: {0}")]
    TokenCreationFailed(String),
}

impl TokenError {
    /// Stable error code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Config(_) => "AUTH_CONFIG_ERROR",
            TokenError::MissingToken(_) => "AUTH_MISSING_TOKEN",
            TokenError::MalformedHeader(_) => "AUTH_MALFORMED_HEADER",
            TokenError::InvalidToken(_) => "AUTH_INVALID_TOKEN",
            TokenError::TokenExpired => "AUTH_TOKEN_EXPIRED",
            TokenError::RefreshTokenExpired => "AUTH_REFRESH_TOKEN_EXPIRED",
            TokenError::TokenCreationFailed(_) => "AUTH_TOKEN_CREATION_FAILED",
        }
    }

    /// Whether the client has to go through full authentication again.
    ///
    /// An expired access token is the one token failure that can be
    /// recovered through the refresh flow instead.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            TokenError::MissingToken(_)
                | TokenError::MalformedHeader(_)
                | TokenError::InvalidToken(_)
                | TokenError::RefreshTokenExpired
        )
    }

    /// Check if this is one of the two expiry errors.
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenError::TokenExpired | TokenError::RefreshTokenExpired)
    }
}

/// Error response for API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Add details to the error response.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<TokenError> for ErrorResponse {
    fn from(err: TokenError) -> Self {
        let code = err.code();
        match err {
            TokenError::Config(details) => {
                Self::new(code, "Token service is misconfigured").with_details(details)
            }
            TokenError::MissingToken(details) => {
                Self::new(code, "Authorization token is missing").with_details(details)
            }
            TokenError::MalformedHeader(details) => {
                Self::new(code, "Authorization header is malformed").with_details(details)
            }
            TokenError::InvalidToken(details) => {
                Self::new(code, "Invalid token").with_details(details)
            }
            TokenError::TokenExpired => Self::new(code, "Access token has expired"),
            TokenError::RefreshTokenExpired => Self::new(code, "Refresh token has expired"),
            TokenError::TokenCreationFailed(details) => {
                Self::new(code, "Failed to create token").with_details(details)
            }
        }
    }
}

/// Result type alias using TokenError.
pub type Result<T> = std::result::Result<T, TokenError>;

//! Bearer token extraction from the `Authorization` header.
//!
//! Only structure is checked here. Nothing is decoded, so malformed input is
//! rejected before any cryptographic work.

use error::TokenError;

/// Placeholder some clients send when no token is stored.
const UNDEFINED: &str = "undefined";

/// Supplies the raw `Authorization` header of the current request.
pub trait HeaderSource: Send + Sync {
    /// The header value, or `None` if the request has none.
    fn authorization(&self) -> Option<String>;
}

impl<F> HeaderSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn authorization(&self) -> Option<String> {
        self()
    }
}

/// A fixed header value.
#[derive(Debug, Clone, Default)]
pub struct StaticHeader(pub Option<String>);

impl StaticHeader {
    /// `Bearer <token>`
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self(Some(format!("Bearer {}", token.as_ref())))
    }
}

impl HeaderSource for StaticHeader {
    fn authorization(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(authorization: Option<&str>) -> Result<&str, TokenError> {
    let header = match authorization {
        Some(h) if !h.is_empty() && h != UNDEFINED => h,
        _ => {
            tracing::warn!("Authorization header is missing");
            return Err(TokenError::MissingToken("authorization header is missing".to_string()));
        }
    };

    let mut parts = header.split(' ');
    let (scheme, token) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) => (scheme, token),
        _ => {
            tracing::warn!("Authorization header is not '<scheme> <token>'");
            return Err(TokenError::MalformedHeader(
                "expected exactly one space between scheme and token".to_string(),
            ));
        }
    };

    if scheme != "Bearer" {
        tracing::warn!("Unsupported authorization scheme: {}", scheme);
        return Err(TokenError::MalformedHeader(
            "authentication scheme must be Bearer".to_string(),
        ));
    }

    if token.is_empty() || token == UNDEFINED {
        tracing::warn!("Bearer token is empty");
        return Err(TokenError::MissingToken("bearer token is empty".to_string()));
    }

    if token.matches('.').count() != 2 {
        tracing::warn!("Bearer token does not have three segments");
        return Err(TokenError::MalformedHeader(
            "token must consist of three dot-separated segments".to_string(),
        ));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_bearer_token() {
        assert_eq!(extract_bearer_token(Some("Bearer a.b.c")).unwrap(), "a.b.c");
    }

    #[test]
    fn test_missing_header() {
        for header in [None, Some(""), Some("undefined")] {
            assert!(matches!(
                extract_bearer_token(header),
                Err(TokenError::MissingToken(_))
            ));
        }
    }

    #[test]
    fn test_bearer_without_token() {
        assert!(matches!(
            extract_bearer_token(Some("Bearer")),
            Err(TokenError::MalformedHeader(_))
        ));
        assert!(matches!(
            extract_bearer_token(Some("Bearer ")),
            Err(TokenError::MissingToken(_))
        ));
        assert!(matches!(
            extract_bearer_token(Some("Bearer undefined")),
            Err(TokenError::MissingToken(_))
        ));
    }

    #[test]
    fn test_wrong_scheme() {
        let err = extract_bearer_token(Some("Basic abc")).unwrap_err();
        assert_eq!(
            err,
            TokenError::MalformedHeader("authentication scheme must be Bearer".into())
        );
        assert!(extract_bearer_token(Some("bearer a.b.c")).is_err());
    }

    #[test]
    fn test_extra_spaces() {
        assert!(matches!(
            extract_bearer_token(Some("Bearer  a.b.c")),
            Err(TokenError::MalformedHeader(_))
        ));
        assert!(matches!(
            extract_bearer_token(Some("Bearer a.b.c extra")),
            Err(TokenError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_segment_count() {
        let err = extract_bearer_token(Some("Bearer a.b")).unwrap_err();
        assert_eq!(
            err,
            TokenError::MalformedHeader("token must consist of three dot-separated segments".into())
        );
        assert!(extract_bearer_token(Some("Bearer a.b.c.d")).is_err());
    }

    #[test]
    fn test_header_sources() {
        let closure = || Some("Bearer x.y.z".to_string());
        assert_eq!(closure.authorization().as_deref(), Some("Bearer x.y.z"));
        assert_eq!(StaticHeader::bearer("x.y.z").authorization().as_deref(), Some("Bearer x.y.z"));
        assert!(StaticHeader::default().authorization().is_none());
    }
}

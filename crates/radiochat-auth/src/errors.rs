//! Auth error types.

use jsonwebtoken::errors::ErrorKind;

/// Reasons a token is refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was supplied.
    #[error("missing token")]
    MissingToken,

    /// The token header names an algorithm other than HS512.
    #[error("token signed with a disallowed algorithm")]
    InvalidAlgorithm,

    /// The signature does not match the shared secret.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// The token is past its expiry (strict mode only).
    #[error("token expired")]
    Expired,

    /// A claim the relay depends on is absent.
    #[error("token is missing required claim: {0}")]
    MissingClaim(String),

    /// The token could not be decoded at all.
    #[error("malformed token: {0}")]
    Malformed(#[source] jsonwebtoken::errors::Error),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidAlgorithm => Self::InvalidAlgorithm,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::MissingRequiredClaim(claim) => Self::MissingClaim(claim.clone()),
            _ => Self::Malformed(err),
        }
    }
}

impl AuthError {
    /// Short machine-readable label, used as a log field and metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidAlgorithm => "invalid_algorithm",
            Self::InvalidSignature => "invalid_signature",
            Self::Expired => "expired",
            Self::MissingClaim(_) => "missing_claim",
            Self::Malformed(_) => "malformed",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_display() {
        assert_eq!(AuthError::MissingToken.to_string(), "missing token");
    }

    #[test]
    fn missing_claim_display() {
        let err = AuthError::MissingClaim("exp".into());
        assert_eq!(err.to_string(), "token is missing required claim: exp");
        assert_eq!(err.reason(), "missing_claim");
    }

    #[test]
    fn from_jwt_error_kinds() {
        let err: AuthError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature).into();
        assert!(matches!(err, AuthError::InvalidSignature));

        let err: AuthError = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature).into();
        assert!(matches!(err, AuthError::Expired));

        let err: AuthError = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken).into();
        assert!(matches!(err, AuthError::Malformed(_)));
        assert_eq!(err.reason(), "malformed");
    }
}

//! HS512 identity token verification.
//!
//! Tokens are issued by the association's identity provider; the relay only
//! verifies them. The signing algorithm is pinned: a token whose header names
//! any other algorithm is refused before the signature is checked.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use radiochat_settings::ExpiryMode;
use serde::Deserialize;
use tracing::warn;

use crate::errors::AuthError;
use crate::identity::{DisplayName, Identity};

/// Clock-skew allowance applied to expiry checks.
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

/// Claims the relay reads from a member token.
#[derive(Debug, Deserialize)]
struct MemberClaims {
    lidnr: i64,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    exp: Option<i64>,
}

/// Outcome of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Routing identity derived from the member number.
    pub identity: Identity,
    /// Name parts from the token.
    pub display: DisplayName,
    /// Expiry claim, when present.
    pub expires_at: Option<DateTime<Utc>>,
    /// `true` when the token was past its expiry but accepted (lenient mode).
    pub expired: bool,
}

/// Verifies member tokens against a single shared secret.
pub struct TokenVerifier {
    key: DecodingKey,
    leeway_secs: u64,
}

impl TokenVerifier {
    /// Create a verifier for tokens signed with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }

    /// Override the clock-skew allowance.
    #[must_use]
    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }

    /// Verify `token` and extract the caller's identity.
    ///
    /// In [`ExpiryMode::Strict`] an expired or `exp`-less token is refused. In
    /// [`ExpiryMode::Lenient`] the signature and algorithm are still enforced
    /// but expiry is only reported through [`VerifiedToken::expired`] and a
    /// warning event.
    pub fn verify(&self, token: &str, mode: ExpiryMode) -> Result<VerifiedToken, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let data = jsonwebtoken::decode::<MemberClaims>(token, &self.key, &self.validation(mode))?;
        let claims = data.claims;

        let now = i64::try_from(jsonwebtoken::get_current_timestamp()).unwrap_or(i64::MAX);
        let leeway = i64::try_from(self.leeway_secs).unwrap_or(i64::MAX);
        let expired = claims
            .exp
            .is_some_and(|exp| exp.saturating_add(leeway) < now);
        let expires_at = claims.exp.and_then(|exp| DateTime::from_timestamp(exp, 0));

        if expired {
            warn!(
                lidnr = claims.lidnr,
                expired_at = ?expires_at,
                "token expired, accepting under lenient expiry policy"
            );
        }

        Ok(VerifiedToken {
            identity: Identity::from_member(claims.lidnr),
            display: DisplayName::new(claims.given_name, claims.family_name),
            expires_at,
            expired,
        })
    }

    fn validation(&self, mode: ExpiryMode) -> Validation {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.leeway = self.leeway_secs;
        validation.validate_aud = false;
        match mode {
            ExpiryMode::Strict => {
                validation.validate_exp = true;
            }
            ExpiryMode::Lenient => {
                validation.validate_exp = false;
                validation.required_spec_claims = HashSet::new();
            }
        }
        validation
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Signed, time-limited tokens embedded in emailed links.
//!
//! A token is an HS256 JWT carrying `{email, purpose, iat}`. The signing key is
//! derived from the server secret and the purpose salt, so a confirmation token
//! never verifies as a reset token even though both share one secret. Tokens are
//! not recorded anywhere and stay valid until they age out, so a link can be
//! followed more than once inside its window.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

pub const DEFAULT_MAX_AGE: Duration = Duration::seconds(3600);

/// What a link token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    EmailConfirmation,
    PasswordReset,
}

impl Purpose {
    pub fn salt(self) -> &'static str {
        match self {
            Purpose::EmailConfirmation => "email-confirmation",
            Purpose::PasswordReset => "password-reset",
        }
    }
}

/// Kept apart internally; callers collapse both into one message for users.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("link token expired")]
    Expired,
    #[error("link token invalid")]
    Invalid,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkClaims {
    email: String,
    purpose: Purpose,
    iat: i64,
}

/// Per-purpose signing key: SHA-256 over salt, a fixed separator and the secret.
pub fn derive_key(secret: &str, purpose: Purpose) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(purpose.salt().as_bytes());
    hasher.update(b"signer");
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

#[derive(Clone)]
pub struct LinkTokens {
    secret: String,
    max_age: Duration,
}

impl LinkTokens {
    pub fn new(secret: impl Into<String>, max_age: Duration) -> Self {
        Self {
            secret: secret.into(),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn issue(&self, email: &str, purpose: Purpose) -> anyhow::Result<String> {
        self.issue_at(email, purpose, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        email: &str,
        purpose: Purpose,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let claims = LinkClaims {
            email: email.to_string(),
            purpose,
            iat: now.unix_timestamp(),
        };
        let key = EncodingKey::from_secret(&derive_key(&self.secret, purpose));
        let token = encode(&Header::new(Algorithm::HS256), &claims, &key)?;
        debug!(purpose = purpose.salt(), "link token issued");
        Ok(token)
    }

    /// Verifies against the configured max age and the current time.
    pub fn verify(&self, token: &str, purpose: Purpose) -> Result<String, TokenError> {
        self.verify_at(token, purpose, self.max_age, OffsetDateTime::now_utc())
    }

    /// Returns the embedded email. A token is still accepted at exactly
    /// `iat + max_age` and rejected one second later.
    pub fn verify_at(
        &self,
        token: &str,
        purpose: Purpose,
        max_age: Duration,
        now: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let key = DecodingKey::from_secret(&derive_key(&self.secret, purpose));
        let data = decode::<LinkClaims>(token, &key, &validation).map_err(|e| {
            debug!(error = %e, purpose = purpose.salt(), "link token rejected");
            TokenError::Invalid
        })?;
        let claims = data.claims;

        if claims.purpose != purpose {
            return Err(TokenError::Invalid);
        }
        // A deadline past i64 seconds never arrives.
        let expired = claims
            .iat
            .checked_add(max_age.whole_seconds())
            .map_or(false, |deadline| deadline < now.unix_timestamp());
        if expired {
            debug!(purpose = purpose.salt(), iat = claims.iat, "link token expired");
            return Err(TokenError::Expired);
        }
        Ok(claims.email)
    }
}

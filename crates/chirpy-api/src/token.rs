//! Signed, purpose-tagged session tokens (HS256 JWT).
//!
//! Wire claims are `{iss, sub, iat, exp, jti}`: `iss` carries the purpose,
//! `sub` the decimal account id, `iat`/`exp` UTC epoch seconds. `jti` keeps
//! two tokens minted in the same second for the same account distinct, which
//! matters because refresh tokens are revoked by their exact string.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chirpy_db::AccountId;

use crate::error::AuthError;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 60 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    /// Short-lived, authorizes ordinary API calls.
    Access,
    /// Long-lived and revocable, only mints new access tokens.
    Refresh,
}

impl TokenPurpose {
    pub fn default_ttl(self) -> Duration {
        match self {
            TokenPurpose::Access => Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            TokenPurpose::Refresh => Duration::seconds(REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenPurpose::Access => f.write_str("access"),
            TokenPurpose::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: TokenPurpose,
    sub: String,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

/// Decoded and checked claims of a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub purpose: TokenPurpose,
    /// Kept as text; the guard decides whether it is an account id.
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn issue(
    purpose: TokenPurpose,
    account_id: AccountId,
    secret: &str,
    ttl: Duration,
) -> Result<String, AuthError> {
    issue_at(purpose, account_id, secret, ttl, Utc::now())
}

/// Like [`issue`], with an explicit issue instant.
pub fn issue_at(
    purpose: TokenPurpose,
    account_id: AccountId,
    secret: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Signing("ttl out of range".into()))?;

    let claims = Claims {
        iss: purpose,
        sub: account_id.to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
        jti: Uuid::new_v4(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))
}

/// Verify signature, structure and expiry. Revocation is not checked here.
pub fn validate(token: &str, secret: &str) -> Result<TokenClaims, AuthError> {
    validate_at(token, secret, Utc::now())
}

/// Like [`validate`], judging expiry against `now`. A token is invalid from
/// the second its `exp` is reached; there is no leeway.
pub fn validate_at(token: &str, secret: &str, now: DateTime<Utc>) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is enforced below against `now`.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["iss", "sub", "exp"]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?
    .claims;

    if now.timestamp() >= claims.exp {
        return Err(AuthError::InvalidToken("token expired".into()));
    }

    Ok(TokenClaims {
        purpose: claims.iss,
        subject: claims.sub,
        issued_at: timestamp(claims.iat)?,
        expires_at: timestamp(claims.exp)?,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidToken(format!("timestamp {} out of range", secs)))
}

//! Bearer-token authorization.
//!
//! Every privileged request ends in exactly one of two states: an
//! [`Authorized`] account id, or an [`AuthError`] naming the first check
//! that failed. Resource ownership is left to the handler via
//! [`require_owner`].

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use subtle::ConstantTimeEq;
use tracing::warn;

use chirpy_db::{AccountId, Database, StoreError, TokenStatus};

use crate::auth::AppState;
use crate::error::AuthError;
use crate::token::{self, TokenClaims, TokenPurpose};

const API_KEY_SCHEME: &str = "ApiKey ";

#[derive(Debug, Clone)]
pub struct Authorized {
    pub account_id: AccountId,
    /// The raw bearer token, needed to revoke it.
    pub token: String,
    pub claims: TokenClaims,
}

/// `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::NoCredential)
}

/// `Authorization: ApiKey <key>`, used by the payment webhook.
pub fn api_key(headers: &HeaderMap) -> Result<String, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(API_KEY_SCHEME))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(AuthError::NoCredential)
}

/// Static shared-secret check for service-to-service calls.
pub fn api_key_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

pub struct AuthGuard<'a> {
    db: &'a Database,
    secret: &'a str,
}

impl<'a> AuthGuard<'a> {
    pub fn new(db: &'a Database, secret: &'a str) -> Self {
        Self { db, secret }
    }

    pub fn authorize(
        &self,
        headers: &HeaderMap,
        required: TokenPurpose,
    ) -> Result<Authorized, AuthError> {
        let token = bearer_token(headers)?;
        self.authorize_token(token, required)
    }

    /// Signature and expiry, then purpose, then revocation (refresh tokens
    /// only), then the subject.
    pub fn authorize_token(
        &self,
        token: String,
        required: TokenPurpose,
    ) -> Result<Authorized, AuthError> {
        let claims = token::validate(&token, self.secret)?;

        if claims.purpose != required {
            return Err(AuthError::WrongPurpose {
                expected: required,
                found: claims.purpose,
            });
        }

        if required == TokenPurpose::Refresh {
            match self.db.check_token(&token) {
                Ok(TokenStatus::Valid) => {}
                Ok(TokenStatus::Revoked(at)) => {
                    warn!("refresh token for subject {} was revoked at {}", claims.subject, at);
                    return Err(AuthError::TokenRevoked);
                }
                Err(StoreError::NotFound(_)) => {
                    warn!("refresh token for subject {} was never registered", claims.subject);
                    return Err(AuthError::TokenRevoked);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let account_id = parse_subject(&claims.subject)?;

        Ok(Authorized {
            account_id,
            token,
            claims,
        })
    }
}

fn parse_subject(subject: &str) -> Result<AccountId, AuthError> {
    subject
        .parse::<AccountId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AuthError::MalformedSubject(subject.to_string()))
}

pub fn require_owner(account_id: AccountId, author_id: AccountId) -> Result<(), AuthError> {
    if account_id == author_id {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Require a valid access token and expose the caller as
/// `Extension<Authorized>` to the handler.
pub async fn require_access(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let authorized = AuthGuard::new(&state.db, &state.jwt_secret)
        .authorize(req.headers(), TokenPurpose::Access)
        .map_err(|e| {
            warn!("rejected access token: {}", e);
            StatusCode::from(e)
        })?;

    req.extensions_mut().insert(authorized);
    Ok(next.run(req).await)
}

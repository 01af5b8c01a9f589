use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, error};

use chirpy_db::StoreError;

use crate::token::TokenPurpose;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed credential header")]
    NoCredential,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("expected a {expected} token, got a {found} token")]
    WrongPurpose {
        expected: TokenPurpose,
        found: TokenPurpose,
    },

    #[error("refresh token revoked or never issued")]
    TokenRevoked,

    #[error("token subject {0:?} is not an account id")]
    MalformedSubject(String),

    #[error("account does not own this resource")]
    Forbidden,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::NoCredential
            | AuthError::InvalidToken(_)
            | AuthError::WrongPurpose { .. }
            | AuthError::TokenRevoked
            | AuthError::MalformedSubject(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Storage(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AuthError::Storage(StoreError::AlreadyExists(_)) => StatusCode::CONFLICT,
            AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<AuthError> for StatusCode {
    fn from(err: AuthError) -> Self {
        err.status()
    }
}

/// Log and convert an error into the status a handler returns.
pub(crate) fn reject(err: impl Into<AuthError>) -> StatusCode {
    let err = err.into();
    let status = err.status();
    if status.is_server_error() {
        error!("request failed: {}", err);
    } else {
        debug!("request rejected ({}): {}", status, err);
    }
    status
}

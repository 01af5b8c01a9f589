use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Duration;
use tracing::info;

use chirpy_db::{Database, StoreError};
use chirpy_types::api::{
    CredentialsRequest, LoginRequest, LoginResponse, RefreshResponse, UserResponse,
};

use crate::error::reject;
use crate::guard::{AuthGuard, Authorized};
use crate::password::{hash_password, verify_password};
use crate::token::{self, ACCESS_TOKEN_TTL_SECS, TokenPurpose};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Shared key of the payment provider's webhook.
    pub polka_key: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_credentials(&req)?;

    let password_hash = hash_password(&req.password).map_err(reject)?;
    let account = state
        .db
        .create_account(&req.email, &password_hash)
        .map_err(reject)?;

    info!("registered account {}", account.id);
    Ok((StatusCode::CREATED, Json(UserResponse::from(&account))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Unknown email and wrong password look the same to the client.
    let account = match state.db.get_account_by_email(&req.email) {
        Ok(account) => account,
        Err(StoreError::NotFound(_)) => return Err(StatusCode::UNAUTHORIZED),
        Err(e) => return Err(reject(e)),
    };

    if !verify_password(&req.password, &account.password_hash) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let access_ttl = req
        .expires_in_seconds
        .filter(|secs| *secs > 0)
        .map(|secs| Duration::seconds(secs.min(ACCESS_TOKEN_TTL_SECS as u64) as i64))
        .unwrap_or_else(|| TokenPurpose::Access.default_ttl());

    let token = token::issue(TokenPurpose::Access, account.id, &state.jwt_secret, access_ttl)
        .map_err(reject)?;
    let refresh_token = token::issue(
        TokenPurpose::Refresh,
        account.id,
        &state.jwt_secret,
        TokenPurpose::Refresh.default_ttl(),
    )
    .map_err(reject)?;

    state.db.add_refresh_token(&refresh_token).map_err(reject)?;

    Ok(Json(LoginResponse {
        id: account.id,
        email: account.email,
        is_chirpy_red: account.is_upgraded,
        token,
        refresh_token,
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(authorized): Extension<Authorized>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    validate_credentials(&req)?;

    let password_hash = hash_password(&req.password).map_err(reject)?;
    let account = state
        .db
        .update_account(authorized.account_id, &req.email, &password_hash)
        .map_err(reject)?;

    Ok(Json(UserResponse::from(&account)))
}

/// Mint a new access token from a live refresh token.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let authorized = AuthGuard::new(&state.db, &state.jwt_secret)
        .authorize(&headers, TokenPurpose::Refresh)
        .map_err(reject)?;

    let token = token::issue(
        TokenPurpose::Access,
        authorized.account_id,
        &state.jwt_secret,
        TokenPurpose::Access.default_ttl(),
    )
    .map_err(reject)?;

    Ok(Json(RefreshResponse { token }))
}

pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let authorized = AuthGuard::new(&state.db, &state.jwt_secret)
        .authorize(&headers, TokenPurpose::Refresh)
        .map_err(reject)?;

    state.db.revoke_token(&authorized.token).map_err(reject)?;

    info!("revoked refresh token of account {}", authorized.account_id);
    Ok(StatusCode::NO_CONTENT)
}

fn validate_credentials(req: &CredentialsRequest) -> Result<(), StatusCode> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(())
}

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use tracing::{debug, info, warn};

use chirpy_types::api::WebhookRequest;

use crate::auth::AppState;
use crate::error::reject;
use crate::guard::{api_key, api_key_matches};

pub const UPGRADE_EVENT: &str = "user.upgraded";

/// Payment provider callback. Authenticated by a static API key rather than
/// a signed token. Events other than an upgrade are acknowledged and ignored.
///
/// The key is checked before the body is looked at, so an unauthenticated
/// caller always gets 401 whatever it sent.
pub async fn polka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<StatusCode, StatusCode> {
    let key = api_key(&headers).map_err(reject)?;
    if !api_key_matches(&key, &state.polka_key) {
        warn!("webhook called with a wrong API key");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let Json(req) = body.map_err(|rejection| {
        debug!("malformed webhook body: {}", rejection.body_text());
        rejection.status()
    })?;

    if req.event != UPGRADE_EVENT {
        return Ok(StatusCode::NO_CONTENT);
    }

    state.db.upgrade_account(req.data.user_id).map_err(reject)?;

    info!("account {} upgraded", req.data.user_id);
    Ok(StatusCode::NO_CONTENT)
}

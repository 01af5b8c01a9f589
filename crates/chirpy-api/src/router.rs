use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::auth::{self, AppState};
use crate::chirps;
use crate::guard::require_access;
use crate::webhooks;

/// All `/api` routes. Routes behind `require_access` see the caller as
/// `Extension<Authorized>`; refresh and revoke check their own token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/healthz", get(healthz))
        .route("/api/users", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh))
        .route("/api/revoke", post(auth::revoke))
        .route("/api/chirps", get(chirps::list_chirps))
        .route("/api/chirps/{chirp_id}", get(chirps::get_chirp))
        .route("/api/polka/webhooks", post(webhooks::polka_webhook))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/users", put(auth::update_user))
        .route("/api/chirps", post(chirps::create_chirp))
        .route("/api/chirps/{chirp_id}", delete(chirps::delete_chirp))
        .layer(middleware::from_fn_with_state(state.clone(), require_access))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn healthz() -> &'static str {
    "OK"
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;

use chirpy_db::{Database, PostId};
use chirpy_types::api::{ChirpQuery, ChirpResponse, CreateChirpRequest, SortOrder};

use crate::auth::AppState;
use crate::error::{AuthError, reject};
use crate::guard::{Authorized, require_owner};

pub const MAX_CHIRP_LENGTH: usize = 140;

const PROFANE_WORDS: [&str; 3] = ["kerfuffle", "sharbert", "fornax"];
const MASK: &str = "****";

/// Mask profane words. Words are split on single spaces and compared
/// case-insensitively; punctuation attached to a word defeats the match.
pub fn clean_body(body: &str) -> String {
    body.split(' ')
        .map(|word| {
            if PROFANE_WORDS.iter().any(|p| p.eq_ignore_ascii_case(word)) {
                MASK
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a store call off the async runtime.
async fn with_db<F, T, E>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<AuthError> + Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(reject)
}

pub async fn create_chirp(
    State(state): State<AppState>,
    Extension(authorized): Extension<Authorized>,
    Json(req): Json<CreateChirpRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let body = clean_body(&req.body);
    if body.chars().count() > MAX_CHIRP_LENGTH {
        return Err(StatusCode::BAD_REQUEST);
    }

    let author_id = authorized.account_id;
    let post = with_db(&state, move |db| db.create_post(&body, author_id)).await?;

    Ok((StatusCode::CREATED, Json(ChirpResponse::from(post))))
}

pub async fn list_chirps(
    State(state): State<AppState>,
    Query(query): Query<ChirpQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let mut posts = with_db(&state, |db| db.list_posts()).await?;

    if let Some(author_id) = query.author_id {
        posts.retain(|p| p.author_id == author_id);
    }
    posts.sort_by_key(|p| p.id);
    if query.sort == SortOrder::Desc {
        posts.reverse();
    }

    let chirps: Vec<ChirpResponse> = posts.into_iter().map(ChirpResponse::from).collect();
    Ok(Json(chirps))
}

pub async fn get_chirp(
    State(state): State<AppState>,
    Path(chirp_id): Path<PostId>,
) -> Result<impl IntoResponse, StatusCode> {
    let post = with_db(&state, move |db| db.get_post(chirp_id)).await?;
    Ok(Json(ChirpResponse::from(post)))
}

/// Only the author may delete a chirp.
pub async fn delete_chirp(
    State(state): State<AppState>,
    Path(chirp_id): Path<PostId>,
    Extension(authorized): Extension<Authorized>,
) -> Result<impl IntoResponse, StatusCode> {
    let account_id = authorized.account_id;
    with_db(&state, move |db| -> Result<(), AuthError> {
        let post = db.get_post(chirp_id)?;
        require_owner(account_id, post.author_id)?;
        db.delete_post(post.id)?;
        Ok(())
    })
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

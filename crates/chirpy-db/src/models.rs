//! Records as they are stored on disk.
//!
//! Distinct from the chirpy-types response bodies so the password hash
//! stays inside the store and the handlers that verify it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chirpy_types::api::{ChirpResponse, UserResponse};

pub type AccountId = u64;
pub type PostId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    pub password_hash: String,
    /// Set by the payment webhook only.
    #[serde(default)]
    pub is_upgraded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub body: String,
    pub author_id: AccountId,
}

/// The entire dataset. Serialized as one JSON document.
///
/// `revoked_tokens` maps a refresh token to `None` while it is live and to
/// the revocation instant once revoked.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub accounts: BTreeMap<AccountId, Account>,
    #[serde(default)]
    pub posts: BTreeMap<PostId, Post>,
    #[serde(default)]
    pub revoked_tokens: BTreeMap<String, Option<DateTime<Utc>>>,
}

/// Revocation state of a registered refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Revoked(DateTime<Utc>),
}

impl From<&Account> for UserResponse {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_chirpy_red: account.is_upgraded,
        }
    }
}

impl From<Post> for ChirpResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            body: post.body,
            author_id: post.author_id,
        }
    }
}

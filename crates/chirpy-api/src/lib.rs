pub mod auth;
pub mod chirps;
pub mod error;
pub mod guard;
pub mod password;
pub mod router;
pub mod token;
pub mod webhooks;

pub use error::AuthError;
pub use router::router;

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Parser)]
#[command(name = "chirpy", about = "Chirpy social post server")]
pub struct Cli {
    /// Delete the database file before starting.
    #[arg(long)]
    pub debug: bool,
}

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub polka_key: String,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            DEV_JWT_SECRET.into()
        });
        // An empty key rejects every webhook call.
        let polka_key = std::env::var("POLKA_KEY").unwrap_or_default();
        let db_path = std::env::var("CHIRPY_DB_PATH").unwrap_or_else(|_| "database.json".into());
        let static_dir = std::env::var("CHIRPY_STATIC_DIR").unwrap_or_else(|_| ".".into());
        let host = std::env::var("CHIRPY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("CHIRPY_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()?;

        Ok(Self {
            jwt_secret,
            polka_key,
            db_path: PathBuf::from(db_path),
            static_dir: PathBuf::from(static_dir),
            host,
            port,
        })
    }
}

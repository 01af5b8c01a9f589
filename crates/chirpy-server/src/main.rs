mod admin;
mod config;

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use chirpy_api::auth::{AppState, AppStateInner};
use chirpy_db::Database;

use crate::admin::Metrics;
use crate::config::{Cli, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chirpy=debug,chirpy_api=debug,chirpy_db=debug,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    if cli.debug {
        match std::fs::remove_file(&config.db_path) {
            Ok(()) => info!("Debug mode: removed {}", config.db_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    // Init store
    let db = Database::open(&config.db_path)?;

    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        polka_key: config.polka_key.clone(),
    });
    let metrics = Metrics::default();

    // Routes
    let admin_routes = admin::routes(metrics.clone());

    let static_routes = Router::new()
        .nest_service("/app", ServeDir::new(&config.static_dir))
        .layer(middleware::from_fn_with_state(metrics, admin::count_hits));

    let app = Router::new()
        .merge(chirpy_api::router(app_state))
        .merge(admin_routes)
        .merge(static_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Chirpy server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Carbon offset marketplace backend: entry point.
//!
//! Serves the project catalog, order settlement, private order lookup and
//! the anonymised public registry over a small Axum REST API backed by
//! SQLite.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod registry;
mod seed;
mod settlement;

use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;

    if let Some(path) = &config.seed_file {
        info!("Seeding catalog from {}", path.display());
        let projects = seed::load_seed_file(path).await?;
        seed::replace_catalog(&pool, projects).await?;
    }

    let addr = format!("0.0.0.0:{}", config.api_port);
    let state = Arc::new(api::ApiState { pool, config });

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

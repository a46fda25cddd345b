// Main entry point for the lost-and-found API server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lostfound_core::server::build_app;
use lostfound_core::{
    kernel::{HttpMediaStore, JwtIdentityProvider, JwtService, ServerDeps},
    Config,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lostfound_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting lost-and-found API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire up external collaborators
    let jwt = JwtService::new(&config.jwt_secret, config.jwt_issuer.clone());
    let identity = Arc::new(JwtIdentityProvider::new(pool.clone(), jwt));
    let media = Arc::new(HttpMediaStore::new(
        config.media_base_url.clone(),
        config.media_api_key.clone(),
        Duration::from_secs(config.media_timeout_secs),
    ));

    let deps = ServerDeps::new(pool, identity, media);
    let app = build_app(deps);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

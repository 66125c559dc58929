//! AI Studio Server - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables (and `.env`)
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build shared state and the HTTP router
//! 5. Start server on configured port

use ai_studio_server::{app, config, db, state::AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!(site_url = %config.site_url, "Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let port = config.server_port;
    let state = AppState::new(pool, config)?;
    let app = app(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

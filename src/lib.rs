//! AI Studio Server
//!
//! REST backend for an AI image and video generation product: email and OAuth
//! sign-in, a credit ledger, generation jobs proxied to an external provider,
//! file uploads, subscription billing and share-link attribution.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries, row-locking transactions)
//! - **Authentication**: HS256 session JWTs (bearer header or cookie)
//! - **Format**: JSON `{ success, data | error }` envelopes
//!
//! The binary in `main.rs` only loads configuration and serves [`app`].

pub mod config;
pub mod cookies;
pub mod db;
pub mod error;
pub mod format;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::state::AppState;

/// Build the full router for `state`.
pub fn app(state: AppState) -> Router {
    // Routes that need a signed-in user
    let authenticated_routes = Router::new()
        .route("/api/v1/me", get(handlers::profile::get_me))
        .route("/api/v1/credits", get(handlers::profile::list_credits))
        // Generation jobs
        .route(
            "/api/v1/jobs",
            post(handlers::jobs::create_job).get(handlers::jobs::list_jobs),
        )
        .route("/api/v1/jobs/{id}", get(handlers::jobs::get_job))
        // Uploads get a larger body limit than the default 2 MB
        .route(
            "/api/v1/uploads",
            post(handlers::uploads::upload_file).layer(DefaultBodyLimit::max(
                services::storage::MAX_UPLOAD_BODY_BYTES,
            )),
        )
        // Billing
        .route(
            "/api/v1/billing/checkout",
            post(handlers::billing::create_checkout),
        )
        .route(
            "/api/v1/subscription",
            get(handlers::billing::get_subscription),
        )
        .route(
            "/api/v1/subscription/cancel",
            post(handlers::billing::cancel_subscription),
        )
        .route(
            "/api/v1/subscription/resume",
            post(handlers::billing::resume_subscription),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        // Public routes (no authentication required)
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/auth/otp/send", post(handlers::auth::send_otp))
        .route("/api/v1/auth/otp/verify", post(handlers::auth::verify_otp))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route(
            "/api/v1/auth/oauth/{provider}/start",
            get(handlers::auth::oauth_start),
        )
        .route(
            "/api/v1/auth/oauth/{provider}/callback",
            get(handlers::auth::oauth_callback),
        )
        .route("/api/v1/effects", get(handlers::effects::list_effects))
        .route("/api/v1/plans", get(handlers::billing::list_plans))
        .route(
            "/api/v1/webhooks/payments",
            post(handlers::webhooks::payment_webhook),
        )
        .route(
            "/api/v1/webhooks/generation",
            post(handlers::webhooks::generation_webhook),
        )
        .route("/s/{code}", get(handlers::share::share_redirect))
        .merge(authenticated_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Browser calls come from the site itself, with cookies.
fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    match HeaderValue::from_str(config.site_origin()) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, site_url = %config.site_url, "SITE_URL is not a valid origin; CORS disabled");
            layer
        }
    }
}

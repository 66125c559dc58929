//! `GET /health` for load balancers and uptime checks.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{db, error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    /// Which optional integrations are configured
    pub features: Features,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Features {
    pub email_sign_in: bool,
    pub google_sign_in: bool,
    pub uploads: bool,
    pub billing: bool,
    pub generation: bool,
}

impl Features {
    fn of(state: &AppState) -> Self {
        Self {
            email_sign_in: state.mailer.is_some(),
            google_sign_in: state.google.is_some(),
            uploads: state.storage.is_some(),
            billing: state.payments.is_some(),
            generation: state.generation.is_some(),
        }
    }
}

/// Answers 200 when Postgres responds; otherwise the standard 500 error body.
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "features": { "email_sign_in": true, "google_sign_in": false, "uploads": true, "billing": true, "generation": false },
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    db::ping(&state.pool).await?;

    Ok(Json(HealthResponse {
        status: "healthy",
        database: "connected",
        features: Features::of(&state),
        timestamp: Utc::now(),
    }))
}

//! Generation job HTTP handlers.
//!
//! This module implements the job endpoints:
//! - POST /api/v1/jobs - Charge credits and submit a job to the provider
//! - GET /api/v1/jobs - List the caller's jobs
//! - GET /api/v1/jobs/{id} - Get one job, refreshed from the provider

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::job::{CreateJobRequest, JobResponse, ListJobsQuery},
    response::ApiResponse,
    services::job_service,
    state::AppState,
};

/// Create a generation job.
///
/// # Request Body
///
/// ```json
/// {
///   "kind": "image",
///   "model": "flux-dev",
///   "prompt": "a lighthouse at dusk, oil painting",
///   "aspect_ratio": "16:9",
///   "num_outputs": 2
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The job, usually `processing`
/// - **Error (400)**: Invalid input or effect of the wrong kind
/// - **Error (404)**: Unknown or inactive effect
/// - **Error (422)**: Not enough credits
/// - **Error (502)**: Provider rejected the job; credits were refunded
/// - **Error (503)**: Generation is disabled; no credits were charged
pub async fn create_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobResponse>>), AppError> {
    let job = job_service::create_job(
        &state.pool,
        state.generation.as_ref(),
        auth.user_id,
        request,
    )
    .await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(job.into())))
}

/// `GET /api/v1/jobs?status=processing&limit=20&offset=0`
pub async fn list_jobs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<ApiResponse<Vec<JobResponse>>>, AppError> {
    let jobs = job_service::list_jobs(&state.pool, auth.user_id, query.status, query.page()).await?;
    Ok(ApiResponse::ok(jobs.into_iter().map(Into::into).collect()))
}

/// `GET /api/v1/jobs/{id}`
///
/// Returns 404 for jobs that don't exist or belong to someone else.
pub async fn get_job(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<JobResponse>>, AppError> {
    let job = job_service::get_job(&state.pool, state.generation.as_ref(), auth.user_id, id).await?;
    Ok(ApiResponse::ok(job.into()))
}

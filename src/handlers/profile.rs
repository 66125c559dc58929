//! Profile and credit ledger endpoints.

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{credit::CreditsResponse, profile::ProfileResponse},
    response::{ApiResponse, Pagination},
    services::{credit_service, profile_service},
    state::AppState,
};

/// `GET /api/v1/me`
///
/// Returns 404 if the session outlived the profile.
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<ProfileResponse>>, AppError> {
    let profile = profile_service::get(&state.pool, auth.user_id).await?;
    Ok(ApiResponse::ok(ProfileResponse::new(
        profile,
        state.config.site_origin(),
    )))
}

/// `GET /api/v1/credits?limit=20&offset=0`
///
/// Current balance plus the newest ledger entries.
pub async fn list_credits(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<Pagination>,
) -> Result<Json<ApiResponse<CreditsResponse>>, AppError> {
    let balance = credit_service::balance(&state.pool, auth.user_id).await?;
    let logs = credit_service::list_logs(&state.pool, auth.user_id, page.normalized()).await?;
    Ok(ApiResponse::ok(CreditsResponse { balance, logs }))
}

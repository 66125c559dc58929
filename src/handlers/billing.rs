//! Plans, checkout and subscription management.
//!
//! - GET /api/v1/plans - Public pricing table
//! - POST /api/v1/billing/checkout - Start a subscription checkout
//! - GET /api/v1/subscription - Current subscription, or `null`
//! - POST /api/v1/subscription/cancel - Cancel at period end
//! - POST /api/v1/subscription/resume - Undo a pending cancel

use axum::{Extension, Json, extract::State};

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::{
        plan::{PLANS, PlanResponse},
        subscription::{CheckoutRequest, CheckoutResponse, Subscription},
    },
    response::ApiResponse,
    services::{billing_service, profile_service},
    state::AppState,
};

pub async fn list_plans(State(state): State<AppState>) -> Json<ApiResponse<Vec<PlanResponse>>> {
    ApiResponse::ok(
        PLANS
            .iter()
            .map(|plan| PlanResponse::new(plan, &state.config))
            .collect(),
    )
}

/// Create a checkout session for `plan`.
///
/// # Request Body
///
/// ```json
/// { "plan": "pro" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "url": "https://checkout..." }`
/// - **Error (400)**: Unknown plan, or already subscribed
/// - **Error (503)**: Billing not configured for this plan
pub async fn create_checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutResponse>>, AppError> {
    let profile = profile_service::get(&state.pool, auth.user_id).await?;
    let url = billing_service::create_checkout(
        &state.pool,
        &state.config,
        state.payments.as_ref(),
        &profile,
        request.plan.trim(),
    )
    .await?;

    Ok(ApiResponse::ok(CheckoutResponse { url }))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Option<Subscription>>>, AppError> {
    let subscription = billing_service::get_subscription(&state.pool, auth.user_id).await?;
    Ok(ApiResponse::ok(subscription))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Subscription>>, AppError> {
    let subscription =
        billing_service::cancel(&state.pool, state.payments.as_ref(), auth.user_id).await?;
    Ok(ApiResponse::ok(subscription))
}

pub async fn resume_subscription(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Subscription>>, AppError> {
    let subscription =
        billing_service::resume(&state.pool, state.payments.as_ref(), auth.user_id).await?;
    Ok(ApiResponse::ok(subscription))
}

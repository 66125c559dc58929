//! Inbound webhook handlers.
//!
//! This module implements the endpoints external services call back:
//! - POST /api/v1/webhooks/payments - Payment processor events
//! - POST /api/v1/webhooks/generation - Generation provider status callbacks
//!
//! Both take the raw body so the HMAC is checked over exactly the bytes that
//! were signed, before anything is parsed.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::{
    error::AppError,
    response::ApiResponse,
    services::{
        billing_service::{self, PaymentEvent},
        generation_provider::ProviderJob,
        job_service, signature,
    },
    state::AppState,
};

const PAYMENT_SIGNATURE_HEADER: &str = "stripe-signature";
const GENERATION_SIGNATURE_HEADER: &str = "x-signature";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Receive a payment processor event.
///
/// # Headers
///
/// ```text
/// Stripe-Signature: t=1735689600,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "received": true, "duplicate": false }`
/// - **Error (400)**: Bad signature or malformed event
/// - **Error (503)**: No webhook secret configured
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let secret = state
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or(AppError::FeatureDisabled)?;

    let header = header_str(&headers, PAYMENT_SIGNATURE_HEADER).ok_or(AppError::InvalidSignature)?;
    if !signature::verify_payment(secret, &body, header, Utc::now().timestamp()) {
        tracing::warn!("Payment webhook signature rejected");
        return Err(AppError::InvalidSignature);
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid event JSON: {e}")))?;
    let event: PaymentEvent = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::InvalidRequest(format!("Invalid event: {e}")))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Payment event received");

    let duplicate = billing_service::handle_payment_event(
        &state.pool,
        &state.config,
        state.payments.as_ref(),
        event,
        payload,
    )
    .await?;

    Ok(ApiResponse::ok(
        json!({ "received": true, "duplicate": duplicate }),
    ))
}

/// Receive a generation provider status callback.
///
/// # Request Body
///
/// ```json
/// { "id": "gen_8f2k", "status": "completed", "outputs": ["https://..."] }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "job_id": "...", "status": "succeeded" }`
/// - **Error (401)**: Missing or bad `X-Signature`
/// - **Error (404)**: No job with this provider id
/// - **Error (503)**: No webhook secret configured
pub async fn generation_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    let secret = state
        .config
        .generation_webhook_secret
        .as_deref()
        .ok_or(AppError::FeatureDisabled)?;

    let header = header_str(&headers, GENERATION_SIGNATURE_HEADER).ok_or(AppError::Unauthorized)?;
    if !signature::verify_body(secret, &body, header) {
        tracing::warn!("Generation webhook signature rejected");
        return Err(AppError::Unauthorized);
    }

    let callback: ProviderJob = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid callback: {e}")))?;

    let job = job_service::find_by_provider_id(&state.pool, &callback.id)
        .await?
        .ok_or(AppError::NotFound("Job"))?;

    let job = job_service::apply_provider_update(&state.pool, job.id, callback.into()).await?;

    Ok(ApiResponse::ok(
        json!({ "job_id": job.id, "status": job.status }),
    ))
}

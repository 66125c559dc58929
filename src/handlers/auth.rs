//! Sign-in HTTP handlers.
//!
//! This module implements the authentication endpoints:
//! - POST /api/v1/auth/otp/send - Email a 6-digit sign-in code
//! - POST /api/v1/auth/otp/verify - Exchange the code for a session
//! - POST /api/v1/auth/logout - Clear the session cookie
//! - GET /api/v1/auth/oauth/{provider}/start - Redirect to the identity provider
//! - GET /api/v1/auth/oauth/{provider}/callback - Finish OAuth sign-in

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{AppendHeaders, IntoResponse, Redirect},
};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    cookies,
    error::AppError,
    models::{
        otp::{SendOtpRequest, SendOtpResponse, VerifyOtpRequest},
        profile::{Profile, ProfileResponse, SessionResponse},
    },
    response::ApiResponse,
    services::{
        analytics,
        oauth::{self, OAuthProvider},
        otp_service,
        profile_service::{self, Identity},
        session,
    },
    state::AppState,
};

/// Email a sign-in code.
///
/// # Request Body
///
/// ```json
/// { "email": "ada@example.com" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: `{ "sent": true, "expires_in_seconds": 600 }`
/// - **Error (400)**: Invalid email
/// - **Error (429)**: A code was sent less than a minute ago
/// - **Error (502)**: The email could not be sent; the code is dropped
/// - **Error (503)**: Email delivery is not configured
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<ApiResponse<SendOtpResponse>>, AppError> {
    request.validate()?;
    let mailer = state.mailer.as_ref().ok_or(AppError::FeatureDisabled)?;

    let email = profile_service::normalize_email(&request.email);
    let code = otp_service::issue(&state.pool, &state.config, &email).await?;
    if let Err(e) = mailer
        .send_otp(&email, &code, state.config.otp_ttl_minutes)
        .await
    {
        otp_service::discard(&state.pool, &email, &code).await?;
        return Err(e.into());
    }

    Ok(ApiResponse::ok(SendOtpResponse {
        sent: true,
        expires_in_seconds: state.config.otp_ttl_minutes * 60,
    }))
}

/// Verify a sign-in code and start a session.
///
/// # Request Body
///
/// ```json
/// { "email": "ada@example.com", "code": "042917" }
/// ```
///
/// # Response
///
/// - **Success (200 OK)**: Session token and profile; `session` cookie set
/// - **Error (400)**: Malformed input, expired or wrong code
/// - **Error (403)**: Too many wrong attempts on this code
pub async fn verify_otp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let email = profile_service::normalize_email(&request.email);
    otp_service::verify(&state.pool, &state.config, &email, &request.code).await?;

    let share_ref = cookies::get(&headers, cookies::SHARE_REF_COOKIE);
    let (profile, created) = profile_service::find_or_create(
        &state.pool,
        Identity {
            email: &email,
            share_ref: share_ref.as_deref(),
            ..Default::default()
        },
        state.config.signup_bonus_credits,
    )
    .await?;

    track_sign_in(&state, &profile, created, "email").await;

    let issued = issue_session(&state, &profile)?;
    let mut set_cookies = vec![session_cookie(&state, &issued)];
    if created && share_ref.is_some() {
        set_cookies.push(clear_cookie(&state, cookies::SHARE_REF_COOKIE));
    }

    let body = SessionResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        created,
        user: ProfileResponse::new(profile, state.config.site_origin()),
    };

    Ok((AppendHeaders(set_cookies), ApiResponse::ok(body)))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([clear_cookie(&state, cookies::SESSION_COOKIE)]),
        ApiResponse::ok(json!({ "logged_out": true })),
    )
}

/// Start the OAuth round trip.
///
/// Sets a short-lived `oauth_state` cookie and redirects to the provider.
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let provider: OAuthProvider = provider.parse()?;
    let client = match provider {
        OAuthProvider::Google => state.google.as_ref().ok_or(AppError::FeatureDisabled)?,
    };

    let oauth_state = oauth::generate_state();
    let authorize_url = client.authorize_url(&oauth_state)?;

    let state_cookie = (
        header::SET_COOKIE,
        cookies::set(
            cookies::OAUTH_STATE_COOKIE,
            &oauth_state,
            cookies::OAUTH_STATE_MAX_AGE_SECS,
            state.config.secure_cookies(),
        ),
    );

    Ok((AppendHeaders([state_cookie]), Redirect::to(&authorize_url)))
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Finish the OAuth round trip and land on the dashboard.
///
/// # Errors
///
/// - **400**: Provider returned an error, or `state` doesn't match the cookie
/// - **403**: The provider hasn't verified the email address
/// - **502**: Code exchange or userinfo call failed
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let provider: OAuthProvider = provider.parse()?;
    let client = match provider {
        OAuthProvider::Google => state.google.as_ref().ok_or(AppError::FeatureDisabled)?,
    };

    if let Some(error) = query.error {
        return Err(AppError::InvalidRequest(format!("Sign-in failed: {error}")));
    }

    let expected = cookies::get(&headers, cookies::OAUTH_STATE_COOKIE);
    match (&expected, &query.state) {
        (Some(expected), Some(actual)) if expected == actual => {}
        _ => {
            return Err(AppError::InvalidRequest(
                "OAuth state mismatch".to_string(),
            ));
        }
    }

    let code = query
        .code
        .ok_or_else(|| AppError::InvalidRequest("Missing authorization code".to_string()))?;

    let user = client.fetch_user(&code).await?;
    if !user.email_verified {
        return Err(AppError::Forbidden(
            "Email address is not verified".to_string(),
        ));
    }

    let share_ref = cookies::get(&headers, cookies::SHARE_REF_COOKIE);
    let (profile, created) = profile_service::find_or_create(
        &state.pool,
        Identity {
            email: &user.email,
            display_name: user.name.as_deref(),
            avatar_url: user.picture.as_deref(),
            share_ref: share_ref.as_deref(),
        },
        state.config.signup_bonus_credits,
    )
    .await?;

    track_sign_in(&state, &profile, created, "google").await;

    let issued = issue_session(&state, &profile)?;
    let mut set_cookies = vec![
        session_cookie(&state, &issued),
        clear_cookie(&state, cookies::OAUTH_STATE_COOKIE),
    ];
    if created && share_ref.is_some() {
        set_cookies.push(clear_cookie(&state, cookies::SHARE_REF_COOKIE));
    }

    let dashboard = format!("{}/dashboard", state.config.site_origin());
    Ok((AppendHeaders(set_cookies), Redirect::to(&dashboard)))
}

fn issue_session(state: &AppState, profile: &Profile) -> Result<session::IssuedSession, AppError> {
    session::issue(
        profile.id,
        &profile.email,
        &state.config.jwt_secret,
        state.config.session_ttl_hours,
    )
    .map_err(|e| AppError::Internal(format!("session signing failed: {e}")))
}

fn session_cookie(state: &AppState, issued: &session::IssuedSession) -> (HeaderName, HeaderValue) {
    (
        header::SET_COOKIE,
        cookies::set(
            cookies::SESSION_COOKIE,
            &issued.token,
            issued.max_age_secs,
            state.config.secure_cookies(),
        ),
    )
}

fn clear_cookie(state: &AppState, name: &str) -> (HeaderName, HeaderValue) {
    (
        header::SET_COOKIE,
        cookies::clear(name, state.config.secure_cookies()),
    )
}

async fn track_sign_in(state: &AppState, profile: &Profile, created: bool, method: &'static str) {
    let event = if created { "signup" } else { "login" };
    let mut effects = vec![(
        "sign_in_event",
        analytics::track(
            &state.pool,
            Some(profile.id),
            event,
            json!({ "method": method }),
        )
        .boxed(),
    )];

    if let Some(referrer) = profile.referred_by.filter(|_| created) {
        effects.push((
            "referral_event",
            analytics::track(
                &state.pool,
                Some(referrer),
                "referral_signup",
                json!({ "referred_user": profile.id }),
            )
            .boxed(),
        ));
    }

    analytics::dispatch(effects).await;
}

//! Share link landing: `GET /s/{code}`.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{AppendHeaders, IntoResponse, Redirect},
};
use futures::FutureExt;
use serde_json::json;

use crate::{
    cookies,
    error::AppError,
    services::{analytics, profile_service},
    state::AppState,
};

/// Record the visit and remember the invite code for sign-up attribution.
///
/// Always redirects to the site root. Unknown codes set no cookie, and lookup
/// or recording failures never block the redirect.
pub async fn share_redirect(
    State(state): State<AppState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let home = Redirect::to(state.config.site_origin());

    let referrer = match lookup(&state, &code).await {
        Ok(referrer) => referrer,
        Err(e) => {
            tracing::warn!(code = %code, error = %e, "Share code lookup failed");
            None
        }
    };

    let Some(referrer_id) = referrer else {
        return (AppendHeaders(Vec::<(HeaderName, HeaderValue)>::new()), home);
    };

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    analytics::dispatch(vec![
        (
            "share_visit",
            profile_service::record_share_visit(&state.pool, &code, referrer_id, user_agent)
                .boxed(),
        ),
        (
            "share_visit_event",
            analytics::track(
                &state.pool,
                Some(referrer_id),
                "share_visit",
                json!({ "code": &code }),
            )
            .boxed(),
        ),
    ])
    .await;

    let cookie = cookies::set(
        cookies::SHARE_REF_COOKIE,
        &code,
        cookies::SHARE_REF_MAX_AGE_SECS,
        state.config.secure_cookies(),
    );
    (AppendHeaders(vec![(header::SET_COOKIE, cookie)]), home)
}

async fn lookup(state: &AppState, code: &str) -> Result<Option<uuid::Uuid>, AppError> {
    // Invite codes are alphanumeric; anything else can't match and must not
    // end up in a cookie
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Ok(None);
    }
    profile_service::referrer_for(&state.pool, code).await
}

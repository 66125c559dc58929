//! Session authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the session JWT from the Authorization header or `session` cookie
//! 2. Verify its signature and expiry
//! 3. Inject authentication context into the request
//! 4. Reject unauthenticated requests with HTTP 401

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{cookies, error::AppError, services::session, state::AppState};

/// Authentication context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Profile id of the signed-in user
    ///
    /// Used to scope every query (jobs, credits, subscription) to the caller
    pub user_id: Uuid,
}

/// Session token from `Authorization: Bearer <jwt>`, falling back to the
/// `session` cookie set by browser sign-in.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| cookies::get(headers, cookies::SESSION_COOKIE))
}

/// Session authentication middleware function.
///
/// # Flow
///
/// 1. Read the token from the `Authorization` header or the `session` cookie
/// 2. Validate it against `JWT_SECRET`
/// 3. If valid: inject `AuthContext` into request, call next handler
/// 4. If not: return 401 Unauthorized error
///
/// The token is self-contained, so no database lookup happens here. Handlers
/// that need the profile load it and answer 404 if it was deleted.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(request.headers()).ok_or(AppError::Unauthorized)?;

    let claims = session::validate(&token, &state.config.jwt_secret).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AppError::Unauthorized
    })?;

    request
        .extensions_mut()
        .insert(AuthContext { user_id: claims.sub });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session=xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_token() {
        assert!(session_token(&HeaderMap::new()).is_none());
    }
}

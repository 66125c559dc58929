//! Minimal cookie reading and `Set-Cookie` building.

use axum::http::{HeaderMap, HeaderValue, header};

/// Session JWT for browser clients.
pub const SESSION_COOKIE: &str = "session";
/// CSRF state for the OAuth round trip.
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
/// Invite code of the share link that brought the visitor in.
pub const SHARE_REF_COOKIE: &str = "share_ref";

pub const SHARE_REF_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;
pub const OAUTH_STATE_MAX_AGE_SECS: i64 = 10 * 60;

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn get(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value for an HttpOnly, `SameSite=Lax` cookie on `/`.
///
/// Only cookie-safe values (tokens, hex, alphanumerics) are passed here, so no
/// encoding is applied.
pub fn set(name: &str, value: &str, max_age_secs: i64, secure: bool) -> HeaderValue {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` value that deletes `name`.
pub fn clear(name: &str, secure: bool) -> HeaderValue {
    set(name, "", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; share_ref=AbC123xy; session=tok"),
        );
        assert_eq!(get(&headers, "share_ref").as_deref(), Some("AbC123xy"));
        assert_eq!(get(&headers, "session").as_deref(), Some("tok"));
        assert_eq!(get(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(get(&headers, "session"), None);
    }

    #[test]
    fn builds_set_cookie() {
        let value = set("session", "abc", 3600, true);
        assert_eq!(
            value.to_str().unwrap(),
            "session=abc; Path=/; Max-Age=3600; HttpOnly; SameSite=Lax; Secure"
        );
        let cleared = clear("session", false);
        assert_eq!(
            cleared.to_str().unwrap(),
            "session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax"
        );
    }
}

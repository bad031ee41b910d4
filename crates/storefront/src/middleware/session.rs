//! Session cookie construction and parsing.
//!
//! The session token itself is opaque: issued and verified by the identity
//! collaborator. This module only owns its transport - one cookie with
//! fixed attributes. `Secure` is appended exactly when the configured base
//! URL is https, so local development over http keeps working.

use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "session";

/// Cookie lifetime granted at login.
pub const LOGIN_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Cookie lifetime granted on explicit renewal.
pub const RENEW_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Build the `Set-Cookie` value carrying a session token.
#[must_use]
pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Build the `Set-Cookie` value that clears the session (logout).
#[must_use]
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Extract the session token from a request's `Cookie` header, if any.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE_NAME).then(|| value.to_owned())
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_login_cookie_attributes() {
        let cookie = session_cookie("tok-1", LOGIN_MAX_AGE, true);
        assert_eq!(
            cookie,
            "session=tok-1; Path=/; Max-Age=86400; HttpOnly; SameSite=Strict; Secure"
        );
    }

    #[test]
    fn test_renew_cookie_lasts_a_week() {
        let cookie = session_cookie("tok-1", RENEW_MAX_AGE, false);
        assert!(cookie.contains("Max-Age=604800"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(true);
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_token_parsed_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=tok-1; lang=es"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_missing_cookie_is_none() {
        assert_eq!(session_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_token(&headers), None);
    }
}

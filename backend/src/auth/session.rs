//! The signed `token` cookie that carries a session JWT.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};

pub const SESSION_COOKIE: &str = "token";

/// Build the session cookie. It lives exactly as long as the token inside.
pub fn session_cookie(token: String, lifetime: Duration, secure: bool) -> Cookie<'static> {
    let max_age = time::Duration::try_from(lifetime).unwrap_or(time::Duration::MAX);
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

pub fn start_session(
    jar: SignedCookieJar,
    token: String,
    lifetime: Duration,
    secure: bool,
) -> SignedCookieJar {
    jar.add(session_cookie(token, lifetime, secure))
}

/// Expire the session cookie if the request carried one.
pub fn clear_session(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// The token from a cookie whose signature checks out. Forged or unsigned
/// cookies read as no session at all.
pub fn session_token(jar: &SignedCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header};
    use axum::response::IntoResponse;
    use axum_extra::extract::cookie::Key;

    const DAY: Duration = Duration::from_secs(86_400);

    fn key() -> Key {
        Key::derive_from(&[42; 32])
    }

    fn set_cookie_headers(jar: SignedCookieJar) -> Vec<String> {
        jar.into_response()
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|value| value.to_str().expect("ascii").to_owned())
            .collect()
    }

    fn request_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).expect("header"));
        headers
    }

    #[test]
    fn cookie_is_http_only_and_scoped_to_root() {
        let cookie = session_cookie("jwt".into(), DAY, false);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "jwt");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(1)));
    }

    #[test]
    fn production_cookie_is_secure() {
        let cookie = session_cookie("jwt".into(), DAY, true);
        assert_eq!(cookie.secure(), Some(true));
    }

    #[test]
    fn started_session_is_signed_and_readable() {
        let jar = start_session(SignedCookieJar::new(key()), "jwt".into(), DAY, false);
        assert_eq!(session_token(&jar), Some("jwt".to_owned()));

        let headers = set_cookie_headers(jar);
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("token="));
        assert!(!headers[0].starts_with("token=jwt;"), "value must carry a signature");
        assert!(headers[0].contains("HttpOnly"));
    }

    #[test]
    fn signed_cookie_survives_a_round_trip() {
        let jar = start_session(SignedCookieJar::new(key()), "jwt".into(), DAY, false);
        let header = set_cookie_headers(jar).remove(0);
        let pair = header.split(';').next().expect("cookie pair");

        let incoming = SignedCookieJar::from_headers(&request_with(pair), key());
        assert_eq!(session_token(&incoming), Some("jwt".to_owned()));
    }

    #[test]
    fn unsigned_cookie_is_ignored() {
        let incoming = SignedCookieJar::from_headers(&request_with("token=jwt"), key());
        assert_eq!(session_token(&incoming), None);
    }

    #[test]
    fn cookie_signed_with_other_key_is_ignored() {
        let other = Key::derive_from(&[7; 32]);
        let jar = start_session(SignedCookieJar::new(other), "jwt".into(), DAY, false);
        let header = set_cookie_headers(jar).remove(0);
        let pair = header.split(';').next().expect("cookie pair");

        let incoming = SignedCookieJar::from_headers(&request_with(pair), key());
        assert_eq!(session_token(&incoming), None);
    }

    #[test]
    fn clearing_expires_an_existing_cookie() {
        let jar = start_session(SignedCookieJar::new(key()), "jwt".into(), DAY, false);
        let header = set_cookie_headers(jar).remove(0);
        let pair = header.split(';').next().expect("cookie pair");

        let incoming = SignedCookieJar::from_headers(&request_with(pair), key());
        let headers = set_cookie_headers(clear_session(incoming));
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("token=;"));
        assert!(headers[0].contains("Max-Age=0"));
    }
}

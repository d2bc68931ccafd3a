//! The `sessionid` cookie.

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "sessionid";

/// The session id sent by the browser, if any.
///
/// Looks through every `Cookie` header; empty values count as absent.
#[must_use]
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Headers that set the session cookie to `id`.
///
/// Ids with characters a cookie cannot carry produce no header.
#[must_use]
pub fn set_session(id: &str) -> HeaderMap {
    cookie_headers(&format!("{SESSION_COOKIE}={id}; HttpOnly; Path=/"))
}

/// Headers that expire the session cookie.
#[must_use]
pub fn clear_session() -> HeaderMap {
    cookie_headers(&format!(
        "{SESSION_COOKIE}=; HttpOnly; Path=/; Max-Age=0"
    ))
}

fn cookie_headers(cookie: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        },
        Err(_) => tracing::warn!("Session cookie value is not a valid header"),
    }
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn with_cookie(cookie: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static(cookie));
        headers
    }

    #[test]
    fn test_session_id_among_other_cookies() {
        let headers = with_cookie("theme=dark; sessionid=abc123; lang=en");
        assert_eq!(session_id(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_or_empty_session_id() {
        assert_eq!(session_id(&HeaderMap::new()), None);
        assert_eq!(session_id(&with_cookie("theme=dark")), None);
        assert_eq!(session_id(&with_cookie("sessionid=")), None);
    }

    #[test]
    fn test_set_and_clear_cookie() {
        let set = set_session("abc123");
        assert_eq!(
            set.get(SET_COOKIE).unwrap(),
            "sessionid=abc123; HttpOnly; Path=/"
        );

        let cleared = clear_session();
        let value = cleared.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(value.starts_with("sessionid=;"));
        assert!(value.contains("Max-Age=0"));
        assert!(value.contains("HttpOnly"));
    }

    #[test]
    fn test_invalid_id_sets_nothing() {
        assert!(set_session("bad\nid").is_empty());
    }
}

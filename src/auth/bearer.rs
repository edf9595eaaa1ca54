//! Bearer credential parsing for the Authorization header.

use axum::http::{HeaderMap, HeaderValue, header};

/// Extract the token from an `Authorization: Bearer <token>` header.
/// Returns None if the header is missing, not a bearer credential, or empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Build an `Authorization` header value carrying the given token.
pub fn bearer_header_value(token: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {}", token)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_bearer_token_simple() {
        let headers = headers_with("Bearer abc123");
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        let headers = headers_with("bearer abc123");
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_with_spaces() {
        let headers = headers_with("  Bearer   abc123  ");
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_no_header() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_other_scheme() {
        let headers = headers_with("Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_bearer_token_empty() {
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
    }

    #[test]
    fn test_header_value_roundtrip() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer_header_value("xyz").unwrap());
        assert_eq!(bearer_token(&headers), Some("xyz"));
    }
}

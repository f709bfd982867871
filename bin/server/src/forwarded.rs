//! The request the proxy is asking about.
//!
//! A forward-auth check arrives as a plain request from the proxy; the
//! original method, scheme, host and URI travel in `X-Forwarded-*` headers.

use std::borrow::Cow;

use axum::http::{HeaderMap, Method};
use plex_forward_auth_rules::RouteRequest;

pub const X_FORWARDED_METHOD: &str = "x-forwarded-method";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
pub const X_FORWARDED_URI: &str = "x-forwarded-uri";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The effective request, rebuilt from forwarded headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRequest {
    method: String,
    proto: String,
    host: String,
    uri: String,
    source_ip: String,
}

impl ForwardedRequest {
    /// Reads the forwarded headers.
    ///
    /// A missing `X-Forwarded-Method` falls back to the method of the check
    /// itself; a missing `X-Forwarded-Uri` means `/`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, method: &Method) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };

        let forwarded_method = header(X_FORWARDED_METHOD);
        let uri = header(X_FORWARDED_URI);

        Self {
            method: if forwarded_method.is_empty() {
                method.as_str().to_string()
            } else {
                forwarded_method.to_ascii_uppercase()
            },
            proto: header(X_FORWARDED_PROTO),
            host: header(X_FORWARDED_HOST),
            uri: if uri.is_empty() { "/".to_string() } else { uri },
            source_ip: header(X_FORWARDED_FOR),
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the forwarded scheme as sent (possibly empty).
    #[must_use]
    pub fn proto(&self) -> &str {
        &self.proto
    }

    /// Returns `http` only if the proxy said so, else `https`.
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.proto.eq_ignore_ascii_case("http") {
            "http"
        } else {
            "https"
        }
    }

    /// Returns true if the original request came in over https.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.proto.eq_ignore_ascii_case("https")
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn source_ip(&self) -> &str {
        &self.source_ip
    }

    /// Returns the view the rule router matches against.
    #[must_use]
    pub fn route_request(&self) -> RouteRequest<'_> {
        RouteRequest::from_uri(&self.method, &self.host, &self.uri)
    }
}

/// Strips CR and LF so client supplied values cannot forge log lines.
#[must_use]
pub fn sanitize(input: &str) -> Cow<'_, str> {
    if input.contains(['\r', '\n']) {
        Cow::Owned(input.replace(['\r', '\n'], ""))
    } else {
        Cow::Borrowed(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn reads_forwarded_headers() {
        let request = ForwardedRequest::from_headers(
            &headers(&[
                (X_FORWARDED_METHOD, "post"),
                (X_FORWARDED_PROTO, "https"),
                (X_FORWARDED_HOST, "app.example.com"),
                (X_FORWARDED_URI, "/a/b?c=d"),
                (X_FORWARDED_FOR, "10.0.0.1"),
            ]),
            &Method::GET,
        );

        assert_eq!(request.method(), "POST");
        assert_eq!(request.proto(), "https");
        assert!(request.is_https());
        assert_eq!(request.host(), "app.example.com");
        assert_eq!(request.uri(), "/a/b?c=d");
        assert_eq!(request.source_ip(), "10.0.0.1");

        let route = request.route_request();
        assert_eq!(route.path, "/a/b");
        assert_eq!(route.query, "c=d");
    }

    #[test]
    fn missing_headers_fall_back() {
        let request = ForwardedRequest::from_headers(&HeaderMap::new(), &Method::GET);
        assert_eq!(request.method(), "GET");
        assert_eq!(request.uri(), "/");
        assert_eq!(request.host(), "");
        assert_eq!(request.scheme(), "https");
        assert!(!request.is_https());
    }

    #[test]
    fn only_explicit_http_downgrades_scheme() {
        let http = ForwardedRequest::from_headers(
            &headers(&[(X_FORWARDED_PROTO, "HTTP")]),
            &Method::GET,
        );
        assert_eq!(http.scheme(), "http");

        let other = ForwardedRequest::from_headers(
            &headers(&[(X_FORWARDED_PROTO, "gopher")]),
            &Method::GET,
        );
        assert_eq!(other.scheme(), "https");
    }

    #[test]
    fn sanitize_strips_line_breaks() {
        assert_eq!(sanitize("a\r\nb\nc"), "abc");
        assert!(matches!(sanitize("clean"), Cow::Borrowed("clean")));
    }
}

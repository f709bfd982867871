//! Post-login redirect targets.
//!
//! A [`RedirectTarget`] can only be built from the forwarded scheme, host
//! and URI of the request being authenticated, so the value stored in the
//! CSRF state always points back at the host the proxy forwarded. Client
//! supplied absolute URLs never make it in.

use std::fmt;
use url::Url;

use crate::error::RedirectError;

/// An absolute http(s) URL on the forwarded host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    url: Url,
}

impl RedirectTarget {
    /// Builds the target from forwarded request parts.
    ///
    /// - `proto` other than `http`/`https` becomes `https`
    /// - `host` must be a bare `host[:port]`
    /// - `uri` that is not origin-form (`/path?query`) becomes `/`
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not a bare authority or the assembled
    /// URL does not resolve to that same host.
    pub fn from_forwarded(proto: &str, host: &str, uri: &str) -> Result<Self, RedirectError> {
        if !is_bare_authority(host) {
            return Err(RedirectError::InvalidHost {
                host: host.to_string(),
            });
        }

        let scheme = if proto.eq_ignore_ascii_case("http") {
            "http"
        } else {
            "https"
        };
        let path = if is_origin_form(uri) { uri } else { "/" };

        let url = Url::parse(&format!("{scheme}://{host}{path}")).map_err(|e| {
            RedirectError::InvalidUrl {
                reason: e.to_string(),
            }
        })?;

        let target = Self { url };
        let expected = host_without_port(host).to_ascii_lowercase();
        let actual = target.host().to_string();
        if expected.trim_end_matches('.') != actual.trim_end_matches('.') {
            return Err(RedirectError::HostMismatch { expected, actual });
        }
        Ok(target)
    }

    /// Re-validates a target recovered from verified CSRF state.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not an absolute http(s) URL with a
    /// host and no credentials.
    pub fn parse(value: &str) -> Result<Self, RedirectError> {
        let url = Url::parse(value).map_err(|e| RedirectError::InvalidUrl {
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RedirectError::InvalidUrl {
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        if url.host_str().is_none() {
            return Err(RedirectError::InvalidUrl {
                reason: "missing host".to_string(),
            });
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(RedirectError::InvalidUrl {
                reason: "credentials not allowed".to_string(),
            });
        }
        Ok(Self { url })
    }

    /// Returns the target host (lowercased, without port).
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Returns the target as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Strips a trailing `:port` from a host (leaving IPv6 literals intact).
#[must_use]
pub fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn is_bare_authority(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']' | '_'))
}

fn is_origin_form(uri: &str) -> bool {
    uri.starts_with('/')
        && !uri.starts_with("//")
        && !uri.starts_with("/\\")
        && !uri.chars().any(|c| c.is_control() || c == '\\')
}

//! Error types for the session crate.
//!
//! - `CredentialError`: a presented cookie value could not be trusted
//! - `SigningError`: a cookie value could not be produced
//! - `RedirectError`: a redirect target failed the same-host checks

use chrono::{DateTime, Utc};
use std::fmt;

/// Errors from verifying a signed cookie value.
///
/// Callers route the two variants differently: an expired credential is a
/// silent re-authentication, an invalid one is an outright rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The value is malformed, the signature does not match, or the
    /// payload does not decode.
    Invalid { reason: &'static str },
    /// The signature is valid but the credential expired.
    Expired { expired_at: DateTime<Utc> },
}

impl CredentialError {
    /// Returns true if the credential verified but is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    pub(crate) fn invalid(reason: &'static str) -> Self {
        Self::Invalid { reason }
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { reason } => write!(f, "invalid credential: {reason}"),
            Self::Expired { expired_at } => {
                write!(f, "credential expired at {}", expired_at.to_rfc3339())
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// Errors from producing a signed cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// No signing secret was provided.
    EmptySecret,
    /// The payload could not be serialized.
    Encode { reason: String },
    /// Issue time plus lifetime is not a representable date.
    ExpiryOutOfRange,
}

impl fmt::Display for SigningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySecret => write!(f, "signing secret must not be empty"),
            Self::Encode { reason } => write!(f, "failed to encode cookie payload: {reason}"),
            Self::ExpiryOutOfRange => write!(f, "credential expiry is out of range"),
        }
    }
}

impl std::error::Error for SigningError {}

/// Errors from building or validating a post-login redirect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// The forwarded host is not a bare `host[:port]`.
    InvalidHost { host: String },
    /// The assembled target is not an absolute http(s) URL.
    InvalidUrl { reason: String },
    /// The target points at a host other than the one it was built from.
    HostMismatch { expected: String, actual: String },
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHost { host } => write!(f, "invalid forwarded host: {host:?}"),
            Self::InvalidUrl { reason } => write!(f, "invalid redirect target: {reason}"),
            Self::HostMismatch { expected, actual } => {
                write!(f, "redirect host '{actual}' does not match '{expected}'")
            }
        }
    }
}

impl std::error::Error for RedirectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_invalid_display() {
        let err = CredentialError::invalid("signature mismatch");
        assert!(err.to_string().contains("invalid credential"));
        assert!(err.to_string().contains("signature mismatch"));
        assert!(!err.is_expired());
    }

    #[test]
    fn credential_expired_is_expired() {
        let err = CredentialError::Expired {
            expired_at: DateTime::from_timestamp(0, 0).expect("epoch"),
        };
        assert!(err.is_expired());
        assert!(err.to_string().contains("1970-01-01"));
    }

    #[test]
    fn redirect_error_display_quotes_host() {
        let err = RedirectError::InvalidHost {
            host: "evil.com/\r\n".to_string(),
        };
        assert!(err.to_string().contains("\\r\\n"));
    }
}

//! Error types for the gateway server.
//!
//! - `ConfigError`: configuration that cannot be loaded or is invalid
//!   (fatal at startup)
//! - `Denial`: the non-200 outcomes of a forward-auth check, rendered as
//!   generic responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use plex_forward_auth_rules::RuleError;
use plex_forward_auth_session::SigningError;
use std::fmt;

/// Errors from loading and validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    Load { reason: String },
    /// No signing secret was configured.
    MissingSecret,
    /// The session lifetime is zero or too large to represent.
    InvalidLifetime { seconds: u64 },
    /// The provider timeout is zero.
    ZeroTimeout,
    /// The log level is not recognised.
    InvalidLogLevel { value: String },
    /// The auth host is not a bare host name.
    InvalidAuthHost { value: String },
    /// A cookie domain is not a bare host name.
    InvalidCookieDomain { value: String },
    /// The logout redirect is not an absolute http(s) URL.
    InvalidLogoutRedirect { value: String, reason: String },
    /// A cookie name is empty or contains characters cookies cannot carry.
    InvalidCookieName { value: String },
    /// A rule failed to compile.
    InvalidRule { source: RuleError },
    /// The secret cannot key the cookie signer.
    InvalidSecret { source: SigningError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::MissingSecret => write!(f, "\"secret\" option must be set"),
            Self::InvalidLifetime { seconds } => {
                write!(f, "invalid session lifetime of {seconds} seconds")
            }
            Self::ZeroTimeout => {
                write!(f, "\"provider_timeout_seconds\" must be at least one second")
            }
            Self::InvalidLogLevel { value } => write!(f, "invalid log level '{value}'"),
            Self::InvalidAuthHost { value } => write!(f, "invalid auth host '{value}'"),
            Self::InvalidCookieDomain { value } => write!(f, "invalid cookie domain '{value}'"),
            Self::InvalidLogoutRedirect { value, reason } => {
                write!(f, "invalid logout redirect '{value}': {reason}")
            }
            Self::InvalidCookieName { value } => write!(f, "invalid cookie name '{value}'"),
            Self::InvalidRule { source } => write!(f, "invalid rule: {source}"),
            Self::InvalidSecret { source } => write!(f, "invalid secret: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRule { source } => Some(source),
            Self::InvalidSecret { source } => Some(source),
            _ => None,
        }
    }
}

impl From<RuleError> for ConfigError {
    fn from(source: RuleError) -> Self {
        Self::InvalidRule { source }
    }
}

impl From<SigningError> for ConfigError {
    fn from(source: SigningError) -> Self {
        Self::InvalidSecret { source }
    }
}

/// A request the gateway will not let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// Missing, invalid or unacceptable credentials, or a policy miss.
    NotAuthorized,
    /// Authenticated, but without access to the configured server.
    Forbidden,
    /// The identity provider could not be reached or misbehaved.
    ProviderUnavailable,
    /// The session was cleared and there is nowhere to send the user.
    LoggedOut,
    /// A cookie could not be produced.
    Internal,
}

impl Denial {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthorized | Self::LoggedOut => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NotAuthorized => "Not authorized",
            Self::Forbidden => "Forbidden",
            Self::ProviderUnavailable => "Service unavailable",
            Self::LoggedOut => "You have been logged out",
            Self::Internal => "Internal server error",
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

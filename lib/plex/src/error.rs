//! Error types for the Plex client.
//!
//! Every variant maps to "provider unavailable" at the HTTP layer; the
//! distinctions exist for logs.

use std::fmt;

/// Errors from identity provider calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The HTTP client could not be built.
    Client { reason: String },
    /// An endpoint URL could not be built.
    Endpoint { reason: String },
    /// The request failed before a response arrived (connect, timeout).
    Request {
        operation: &'static str,
        reason: String,
    },
    /// The provider answered with a non-success status.
    Status { operation: &'static str, status: u16 },
    /// The response body was not what we expected.
    Decode {
        operation: &'static str,
        reason: String,
    },
    /// The pin has not been claimed by a signed-in user.
    PinNotAuthorized { pin_id: String },
    /// The account's email is missing or malformed.
    InvalidEmail { reason: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { reason } => write!(f, "failed to build HTTP client: {reason}"),
            Self::Endpoint { reason } => write!(f, "invalid provider endpoint: {reason}"),
            Self::Request { operation, reason } => {
                write!(f, "{operation} request failed: {reason}")
            }
            Self::Status { operation, status } => {
                write!(f, "{operation} returned status {status}")
            }
            Self::Decode { operation, reason } => {
                write!(f, "{operation} returned an unexpected body: {reason}")
            }
            Self::PinNotAuthorized { pin_id } => {
                write!(f, "pin {pin_id} has not been authorized")
            }
            Self::InvalidEmail { reason } => write!(f, "account email is invalid: {reason}"),
        }
    }
}

impl std::error::Error for ProviderError {}

//! Email address type for authenticated identities.
//!
//! The identity provider hands back a plain string. Everything downstream
//! (policy checks, session cookies, the `X-Forwarded-User` header) works on
//! an [`Email`] so the shape is checked once at the boundary.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an email address fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEmailError {
    /// The rejected input.
    pub input: String,
    /// The reason for the parse failure.
    pub reason: &'static str,
}

impl fmt::Display for ParseEmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid email address '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseEmailError {}

/// An email address with exactly one `@` and non-empty local and domain parts.
///
/// The address is kept exactly as received; whitelist matching is
/// case-sensitive on the full address, domain matching lowercases
/// [`Email::domain`] itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Parses and validates an email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is empty, contains whitespace or
    /// control characters, or does not have exactly one `@` separating
    /// non-empty parts.
    pub fn parse(input: impl Into<String>) -> Result<Self, ParseEmailError> {
        let input = input.into();
        let reject = |reason| ParseEmailError {
            input: input.clone(),
            reason,
        };

        if input.is_empty() {
            return Err(reject("empty"));
        }
        if input
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(reject("contains whitespace or control characters"));
        }

        let mut parts = input.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(reject("must contain exactly one '@'"));
        };
        if local.is_empty() {
            return Err(reject("empty local part"));
        }
        if domain.is_empty() {
            return Err(reject("empty domain"));
        }

        Ok(Self(input))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or("", |(local, _)| local)
    }

    /// Returns the part after the `@`.
    #[must_use]
    pub fn domain(&self) -> &str {
        self.0.split_once('@').map_or("", |(_, domain)| domain)
    }

    /// Consumes the email and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = ParseEmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = ParseEmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

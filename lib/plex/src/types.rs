//! Plex API payloads and the values handed to callers.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A freshly created login pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// Pin id, used to poll for the token.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Code shown to (and claimed by) the user on the login page.
    pub code: String,
}

/// A Plex account token. Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(..)")
    }
}

/// Body of `GET /pins/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PinStatus {
    #[serde(rename = "authToken", default)]
    pub auth_token: Option<String>,
}

/// Body of `GET /user`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Account {
    #[serde(default)]
    pub email: Option<String>,
}

/// One entry of `GET /resources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// The server's machine identifier.
    pub client_identifier: String,
    /// The account owns the server.
    #[serde(default)]
    pub owned: bool,
    /// The account is in the owner's Plex Home.
    #[serde(default)]
    pub home: bool,
}

/// Plex has returned pin ids both as numbers and as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Number(u64),
        Text(String),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Number(n) => n.to_string(),
        Id::Text(s) => s,
    })
}

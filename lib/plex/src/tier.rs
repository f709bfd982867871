//! Plex server access tiers.
//!
//! When a server identifier is configured, a user must be able to reach
//! that server. How they reach it is recorded for logging but any tier
//! other than `NoAccess` is accepted.

use serde::{Deserialize, Serialize};

use crate::types::Resource;

/// A user's relationship to the configured Plex server, least to most
/// privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessTier {
    /// The server is not in the user's resource list.
    NoAccess,
    /// A friend the server is shared with.
    NormalUser,
    /// A member of the owner's Plex Home.
    HomeUser,
    /// The server owner.
    Owner,
}

impl AccessTier {
    /// Derives the tier from the account's resource list.
    #[must_use]
    pub fn for_server(resources: &[Resource], server_identifier: &str) -> Self {
        match resources
            .iter()
            .find(|resource| resource.client_identifier == server_identifier)
        {
            None => Self::NoAccess,
            Some(resource) if resource.owned => Self::Owner,
            Some(resource) if resource.home => Self::HomeUser,
            Some(_) => Self::NormalUser,
        }
    }

    /// Returns true if this tier may sign in.
    #[must_use]
    pub fn permits(&self) -> bool {
        !matches!(self, Self::NoAccess)
    }

    /// Returns the tier name used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAccess => "no_access",
            Self::NormalUser => "normal_user",
            Self::HomeUser => "home_user",
            Self::Owner => "owner",
        }
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, owned: bool, home: bool) -> Resource {
        Resource {
            client_identifier: id.to_string(),
            owned,
            home,
        }
    }

    #[test]
    fn tiers_are_ordered() {
        assert!(AccessTier::NoAccess < AccessTier::NormalUser);
        assert!(AccessTier::NormalUser < AccessTier::HomeUser);
        assert!(AccessTier::HomeUser < AccessTier::Owner);
    }

    #[test]
    fn only_no_access_is_rejected() {
        assert!(!AccessTier::NoAccess.permits());
        assert!(AccessTier::NormalUser.permits());
        assert!(AccessTier::HomeUser.permits());
        assert!(AccessTier::Owner.permits());
    }

    #[test]
    fn missing_server_is_no_access() {
        let resources = [resource("other", true, true)];
        assert_eq!(AccessTier::for_server(&resources, "srv"), AccessTier::NoAccess);
        assert_eq!(AccessTier::for_server(&[], "srv"), AccessTier::NoAccess);
    }

    #[test]
    fn owned_beats_home() {
        let resources = [resource("srv", true, true)];
        assert_eq!(AccessTier::for_server(&resources, "srv"), AccessTier::Owner);
    }

    #[test]
    fn home_and_shared() {
        assert_eq!(
            AccessTier::for_server(&[resource("srv", false, true)], "srv"),
            AccessTier::HomeUser
        );
        assert_eq!(
            AccessTier::for_server(&[resource("srv", false, false)], "srv"),
            AccessTier::NormalUser
        );
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&AccessTier::HomeUser).expect("serialize");
        assert_eq!(json, "\"home_user\"");
        assert_eq!(AccessTier::HomeUser.to_string(), "home_user");
    }
}

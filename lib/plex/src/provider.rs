//! The identity provider capability used by the auth handlers.

use async_trait::async_trait;
use plex_forward_auth_core::{Email, Result};

use crate::error::ProviderError;
use crate::tier::AccessTier;
use crate::types::{AuthToken, Pin};

/// Operations the gateway needs from an identity provider.
///
/// Implemented by [`crate::PlexClient`]; tests substitute fakes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates a login pin.
    async fn create_pin(&self) -> Result<Pin, ProviderError>;

    /// Builds the login page URL for a pin. After login the provider
    /// sends the user to `forward_url`.
    fn login_url(&self, pin_code: &str, forward_url: &str) -> String;

    /// Exchanges a claimed pin for an account token.
    async fn exchange_token(&self, pin_id: &str) -> Result<AuthToken, ProviderError>;

    /// Looks up the account's email.
    async fn fetch_user(&self, token: &AuthToken) -> Result<Email, ProviderError>;

    /// Looks up the account's access to a server.
    async fn fetch_access_tier(
        &self,
        token: &AuthToken,
        server_identifier: &str,
    ) -> Result<AccessTier, ProviderError>;
}

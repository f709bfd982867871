//! Plex as an identity provider.
//!
//! Login uses the Plex pin flow:
//! 1. `create_pin` asks plex.tv for a pin
//! 2. the user signs in at `login_url`, which claims the pin
//! 3. `exchange_token` trades the claimed pin for an account token
//! 4. `fetch_user` and `fetch_access_tier` identify the account
//!
//! [`IdentityProvider`] is the seam the gateway depends on;
//! [`PlexClient`] is the production implementation.

pub mod client;
pub mod error;
pub mod provider;
pub mod tier;
pub mod types;

pub use client::{DEFAULT_API_BASE, DEFAULT_LOGIN_URL, DEFAULT_TIMEOUT, PlexClient, PlexConfig};
pub use error::ProviderError;
pub use provider::IdentityProvider;
pub use tier::AccessTier;
pub use types::{AuthToken, Pin, Resource};

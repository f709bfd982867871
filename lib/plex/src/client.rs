//! HTTP client for the plex.tv API.

use std::time::Duration;

use async_trait::async_trait;
use plex_forward_auth_core::{Email, Result};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ProviderError;
use crate::provider::IdentityProvider;
use crate::tier::AccessTier;
use crate::types::{Account, AuthToken, Pin, PinStatus, Resource};

/// Base of the plex.tv v2 API.
pub const DEFAULT_API_BASE: &str = "https://plex.tv/api/v2/";

/// The hosted login page. Plex expects the parameters after a `#!` fragment.
pub const DEFAULT_LOGIN_URL: &str = "https://app.plex.tv/auth/#!";

/// Default timeout for every provider request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for [`PlexClient`].
#[derive(Debug, Clone)]
pub struct PlexConfig {
    product: String,
    client_identifier: String,
    timeout: Duration,
    api_base: String,
    login_url: String,
}

impl PlexConfig {
    /// Creates settings for the public plex.tv endpoints.
    #[must_use]
    pub fn new(product: impl Into<String>, client_identifier: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            client_identifier: client_identifier.into(),
            timeout: DEFAULT_TIMEOUT,
            api_base: DEFAULT_API_BASE.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Points API calls somewhere other than plex.tv.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Points the login page somewhere other than app.plex.tv.
    #[must_use]
    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into();
        self
    }

    #[must_use]
    pub fn product(&self) -> &str {
        &self.product
    }

    #[must_use]
    pub fn client_identifier(&self) -> &str {
        &self.client_identifier
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Client for the Plex pin login flow.
#[derive(Debug, Clone)]
pub struct PlexClient {
    http: reqwest::Client,
    api_base: Url,
    login_url: String,
    product: String,
    client_identifier: String,
}

impl PlexClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API base is not a URL or the HTTP client
    /// cannot be built.
    pub fn new(config: PlexConfig) -> Result<Self, ProviderError> {
        let mut api_base = Url::parse(&config.api_base).map_err(|e| ProviderError::Endpoint {
            reason: format!("{}: {e}", config.api_base),
        })?;
        if api_base.cannot_be_a_base() {
            return Err(ProviderError::Endpoint {
                reason: format!("{} cannot be a base URL", config.api_base),
            }
            .into());
        }
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProviderError::Client {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_base,
            login_url: config.login_url,
            product: config.product,
            client_identifier: config.client_identifier,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::Endpoint {
                reason: "API base cannot hold a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header("X-Plex-Product", &self.product)
            .header("X-Plex-Client-Identifier", &self.client_identifier)
    }

    async fn send_json<T: DeserializeOwned>(
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                operation,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                operation,
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.json::<T>().await.map_err(|e| ProviderError::Decode {
            operation,
            reason: e.to_string(),
        })?;
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for PlexClient {
    #[instrument(skip(self))]
    async fn create_pin(&self) -> Result<Pin, ProviderError> {
        let mut url = self.endpoint(&["pins"])?;
        url.query_pairs_mut().append_pair("strong", "true");

        let pin: Pin = Self::send_json("create pin", self.request(Method::POST, url)).await?;
        debug!(pin_id = %pin.id, "created pin");
        Ok(pin)
    }

    fn login_url(&self, pin_code: &str, forward_url: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("clientID", &self.client_identifier)
            .append_pair("code", pin_code)
            .append_pair("forwardUrl", forward_url)
            .finish();
        format!("{}?{query}", self.login_url)
    }

    #[instrument(skip(self))]
    async fn exchange_token(&self, pin_id: &str) -> Result<AuthToken, ProviderError> {
        let url = self.endpoint(&["pins", pin_id])?;
        let status: PinStatus =
            Self::send_json("check pin", self.request(Method::GET, url)).await?;

        match status.auth_token.filter(|token| !token.is_empty()) {
            Some(token) => Ok(AuthToken::new(token)),
            None => Err(ProviderError::PinNotAuthorized {
                pin_id: pin_id.to_string(),
            }
            .into()),
        }
    }

    #[instrument(skip_all)]
    async fn fetch_user(&self, token: &AuthToken) -> Result<Email, ProviderError> {
        let url = self.endpoint(&["user"])?;
        let request = self
            .request(Method::GET, url)
            .header("X-Plex-Token", token.expose());
        let account: Account = Self::send_json("fetch user", request).await?;

        let email = account.email.ok_or_else(|| ProviderError::InvalidEmail {
            reason: "account has no email".to_string(),
        })?;
        let email = Email::parse(email).map_err(|e| ProviderError::InvalidEmail {
            reason: e.to_string(),
        })?;
        Ok(email)
    }

    #[instrument(skip(self, token))]
    async fn fetch_access_tier(
        &self,
        token: &AuthToken,
        server_identifier: &str,
    ) -> Result<AccessTier, ProviderError> {
        let url = self.endpoint(&["resources"])?;
        let request = self
            .request(Method::GET, url)
            .header("X-Plex-Token", token.expose());
        let resources: Vec<Resource> = Self::send_json("fetch resources", request).await?;

        let tier = AccessTier::for_server(&resources, server_identifier);
        debug!(%tier, resources = resources.len(), "resolved access tier");
        Ok(tier)
    }
}

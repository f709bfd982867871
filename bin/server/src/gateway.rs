//! Shared, read-only gateway state and cookie plumbing.

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use plex_forward_auth_plex::IdentityProvider;
use plex_forward_auth_session::{
    CsrfCodec, RedirectTarget, SessionCodec, Signer, SigningError, host_without_port,
};
use time::{Duration as TimeDuration, OffsetDateTime};

use crate::config::GatewayConfig;
use crate::forwarded::ForwardedRequest;

/// Everything a handler needs besides the request.
pub struct Gateway {
    config: GatewayConfig,
    sessions: SessionCodec,
    csrf: CsrfCodec,
    provider: Arc<dyn IdentityProvider>,
}

impl Gateway {
    /// Creates the gateway state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured secret cannot key a signer.
    pub fn new(
        config: GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, SigningError> {
        let signer = Signer::new(config.secret())?;
        Ok(Self {
            sessions: SessionCodec::new(signer.clone(), config.lifetime()),
            csrf: CsrfCodec::new(signer),
            config,
            provider,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        &self.sessions
    }

    #[must_use]
    pub fn csrf(&self) -> &CsrfCodec {
        &self.csrf
    }

    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    /// Returns the configured cookie domain `host` falls under, if any.
    #[must_use]
    pub fn matching_cookie_domain(&self, host: &str) -> Option<&str> {
        let host = host_without_port(host).trim_end_matches('.').to_ascii_lowercase();
        self.config
            .cookie_domains()
            .iter()
            .find(|domain| is_same_or_subdomain(&host, domain))
            .map(String::as_str)
    }

    /// Returns the domain cookies for `host` are set on: a matching
    /// configured cookie domain, else the host itself without its port.
    #[must_use]
    pub fn cookie_domain(&self, host: &str) -> String {
        match self.matching_cookie_domain(host) {
            Some(domain) => domain.to_string(),
            None => host_without_port(host).to_ascii_lowercase(),
        }
    }

    /// Returns the URL the provider sends the user back to.
    ///
    /// The configured auth host is only used when the request host shares a
    /// cookie domain, since otherwise the session cookie set there would be
    /// invisible to the original host.
    #[must_use]
    pub fn callback_url(&self, request: &ForwardedRequest) -> String {
        let host = match self.config.auth_host() {
            Some(auth_host) if self.matching_cookie_domain(request.host()).is_some() => auth_host,
            _ => request.host(),
        };
        format!("{}://{}{}", request.scheme(), host, self.config.url_path())
    }

    /// Returns true if a stored redirect target may be followed from the
    /// callback for `request`.
    #[must_use]
    pub fn redirect_allowed(&self, target: &RedirectTarget, request: &ForwardedRequest) -> bool {
        let callback_host = host_without_port(request.host()).to_ascii_lowercase();
        target.host() == callback_host || self.matching_cookie_domain(target.host()).is_some()
    }

    /// Builds the session cookie.
    #[must_use]
    pub fn session_cookie(&self, value: String, domain: &str) -> Cookie<'static> {
        let max_age = TimeDuration::seconds(self.config.lifetime().num_seconds());
        self.cookie(self.config.cookie_name(), value, domain, max_age)
    }

    /// Builds a cookie that removes the session cookie.
    #[must_use]
    pub fn clear_session_cookie(&self, domain: &str) -> Cookie<'static> {
        self.removal(self.config.cookie_name(), domain)
    }

    /// Builds the CSRF state cookie.
    #[must_use]
    pub fn csrf_cookie(&self, value: String, domain: &str) -> Cookie<'static> {
        let max_age = TimeDuration::seconds(self.csrf.lifetime().num_seconds());
        self.cookie(self.config.csrf_cookie_name(), value, domain, max_age)
    }

    /// Builds a cookie that removes the CSRF state cookie.
    #[must_use]
    pub fn clear_csrf_cookie(&self, domain: &str) -> Cookie<'static> {
        self.removal(self.config.csrf_cookie_name(), domain)
    }

    fn cookie(
        &self,
        name: &str,
        value: String,
        domain: &str,
        max_age: TimeDuration,
    ) -> Cookie<'static> {
        Cookie::build((name.to_string(), value))
            .domain(domain.to_string())
            .path("/")
            .http_only(true)
            .secure(!self.config.insecure_cookie())
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build()
    }

    fn removal(&self, name: &str, domain: &str) -> Cookie<'static> {
        Cookie::build((name.to_string(), String::new()))
            .domain(domain.to_string())
            .path("/")
            .http_only(true)
            .secure(!self.config.insecure_cookie())
            .same_site(SameSite::Lax)
            .max_age(TimeDuration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build()
    }
}

fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

//! Route handlers.
//!
//! Every route in the table is a value implementing [`Handler`]:
//! - `AllowHandler`: lets the request through
//! - `AuthHandler`: requires a session that passes the rule's policy,
//!   starting the Plex login otherwise
//! - `CallbackHandler`: completes the Plex login and issues the session
//! - `LogoutHandler`: clears the session

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use plex_forward_auth_access::AccessPolicy;
use plex_forward_auth_core::Email;
use plex_forward_auth_session::{CredentialError, RedirectTarget};
use tracing::{debug, error, info, warn};

use crate::error::Denial;
use crate::forwarded::{ForwardedRequest, sanitize};
use crate::gateway::Gateway;

/// Header carrying the authenticated email back to the proxy.
pub const X_FORWARDED_USER: HeaderName = HeaderName::from_static("x-forwarded-user");

/// A route's behaviour.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Answers the forward-auth check for `request`.
    async fn handle(&self, gateway: &Gateway, request: &ForwardedRequest, jar: CookieJar)
    -> Response;
}

/// Allows every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowHandler;

#[async_trait]
impl Handler for AllowHandler {
    fn name(&self) -> &'static str {
        "Allow"
    }

    async fn handle(&self, _gateway: &Gateway, _request: &ForwardedRequest, _jar: CookieJar)
    -> Response {
        info!("allowing request");
        StatusCode::OK.into_response()
    }
}

/// Requires an authenticated email permitted by `policy`.
#[derive(Debug, Clone)]
pub struct AuthHandler {
    policy: AccessPolicy,
}

impl AuthHandler {
    #[must_use]
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }
}

#[async_trait]
impl Handler for AuthHandler {
    fn name(&self) -> &'static str {
        "Auth"
    }

    async fn handle(&self, gateway: &Gateway, request: &ForwardedRequest, jar: CookieJar)
    -> Response {
        let value = jar
            .get(gateway.config().cookie_name())
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());
        let Some(value) = value else {
            debug!("no session cookie");
            return start_login(gateway, request, jar).await;
        };

        let domain = gateway.cookie_domain(request.host());
        match gateway.sessions().verify(&value, &domain) {
            Ok(session) => {
                let email = session.email();
                if self.policy.permit(email) {
                    debug!(user = %email, "allowing valid request");
                    authenticated(email)
                } else {
                    warn!(user = %sanitize(email.as_str()), "email not permitted by rule");
                    Denial::NotAuthorized.into_response()
                }
            }
            Err(CredentialError::Expired { expired_at }) => {
                info!(%expired_at, "session has expired");
                start_login(gateway, request, jar).await
            }
            Err(err) => {
                warn!(error = %err, "invalid session cookie");
                Denial::NotAuthorized.into_response()
            }
        }
    }
}

/// Completes the login started by [`AuthHandler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackHandler;

#[async_trait]
impl Handler for CallbackHandler {
    fn name(&self) -> &'static str {
        "AuthCallback"
    }

    async fn handle(&self, gateway: &Gateway, request: &ForwardedRequest, jar: CookieJar)
    -> Response {
        let config = gateway.config();
        let domain = gateway.cookie_domain(request.host());

        // The state cookie is single use: it goes away whatever happens next.
        let value = jar
            .get(config.csrf_cookie_name())
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty());
        let jar = jar.add(gateway.clear_csrf_cookie(&domain));

        let Some(value) = value else {
            info!("missing csrf cookie");
            return (jar, Denial::NotAuthorized).into_response();
        };

        let state = match gateway.csrf().verify(&value, &domain) {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "error validating csrf cookie");
                return (jar, Denial::NotAuthorized).into_response();
            }
        };

        let redirect = state.redirect();
        if !gateway.redirect_allowed(redirect, request) {
            warn!(redirect = %redirect, "redirect target is not on an accepted host");
            return (jar, Denial::NotAuthorized).into_response();
        }

        let provider = gateway.provider();
        let token = match provider.exchange_token(state.pin_id()).await {
            Ok(token) => token,
            Err(err) => {
                error!(error = %err, "pin exchange failed with provider");
                return (jar, Denial::ProviderUnavailable).into_response();
            }
        };

        let email = match provider.fetch_user(&token).await {
            Ok(email) => email,
            Err(err) => {
                error!(error = %err, "error getting user");
                return (jar, Denial::ProviderUnavailable).into_response();
            }
        };

        if let Some(server) = config.server_identifier() {
            match provider.fetch_access_tier(&token, server).await {
                Ok(tier) if tier.permits() => {
                    info!(user = %email, access_tier = %tier, "user authorized");
                }
                Ok(tier) => {
                    info!(user = %email, access_tier = %tier, "user has no access to server");
                    return (jar, Denial::Forbidden).into_response();
                }
                Err(err) => {
                    error!(user = %email, error = %err, "error getting access tier");
                    return (jar, Denial::ProviderUnavailable).into_response();
                }
            }
        }

        let issued = match gateway.sessions().issue(&email, &domain) {
            Ok(issued) => issued,
            Err(err) => {
                error!(error = %err, "failed to issue session");
                return (jar, Denial::Internal).into_response();
            }
        };

        info!(
            user = %email,
            redirect = %redirect,
            expires_at = %issued.session.expires_at(),
            "issued session, redirecting user"
        );
        let jar = jar.add(gateway.session_cookie(issued.value, &domain));
        (jar, Redirect::temporary(redirect.as_str())).into_response()
    }
}

/// Clears the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogoutHandler;

#[async_trait]
impl Handler for LogoutHandler {
    fn name(&self) -> &'static str {
        "Logout"
    }

    async fn handle(&self, gateway: &Gateway, request: &ForwardedRequest, jar: CookieJar)
    -> Response {
        let domain = gateway.cookie_domain(request.host());
        let jar = jar.add(gateway.clear_session_cookie(&domain));
        info!("logged out user");

        match gateway.config().logout_redirect() {
            Some(url) => (jar, Redirect::temporary(url.as_str())).into_response(),
            None => (jar, Denial::LoggedOut).into_response(),
        }
    }
}

fn authenticated(email: &Email) -> Response {
    match HeaderValue::from_bytes(email.as_str().as_bytes()) {
        Ok(value) => (StatusCode::OK, [(X_FORWARDED_USER, value)]).into_response(),
        Err(_) => {
            warn!(user = %sanitize(email.as_str()), "email cannot be sent as a header");
            Denial::NotAuthorized.into_response()
        }
    }
}

/// Sends the user to Plex, remembering where they were going.
async fn start_login(gateway: &Gateway, request: &ForwardedRequest, jar: CookieJar) -> Response {
    let redirect =
        match RedirectTarget::from_forwarded(request.proto(), request.host(), request.uri()) {
            Ok(redirect) => redirect,
            Err(err) => {
                warn!(error = %err, "cannot build a redirect target for this request");
                return Denial::NotAuthorized.into_response();
            }
        };

    let pin = match gateway.provider().create_pin().await {
        Ok(pin) => pin,
        Err(err) => {
            error!(error = %err, "error retrieving pin");
            return Denial::ProviderUnavailable.into_response();
        }
    };

    let domain = gateway.cookie_domain(request.host());
    let issued = match gateway.csrf().issue(&pin.id, &redirect, &domain) {
        Ok(issued) => issued,
        Err(err) => {
            error!(error = %err, "failed to issue csrf state");
            return Denial::Internal.into_response();
        }
    };

    if !gateway.config().insecure_cookie() && !request.is_https() {
        warn!(
            "using \"secure\" cookies for a request that was not received via https; \
             redirect to https or set \"insecure_cookie\" to permit cookies over http"
        );
    }

    let login_url = gateway
        .provider()
        .login_url(&pin.code, &gateway.callback_url(request));
    debug!(pin_id = %pin.id, %login_url, "set csrf cookie and redirected to provider login");

    let jar = jar.add(gateway.csrf_cookie(issued.value, &domain));
    (jar, Redirect::temporary(&login_url)).into_response()
}

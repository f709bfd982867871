//! The axum application: one fallback handler answering every
//! forward-auth check through the rule router.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use plex_forward_auth_access::AccessPolicy;
use plex_forward_auth_core::Result;
use plex_forward_auth_plex::IdentityProvider;
use plex_forward_auth_rules::{RouteTarget, Router, RuleAction};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info, info_span};

use crate::config::GatewayConfig;
use crate::error::ConfigError;
use crate::forwarded::{ForwardedRequest, sanitize};
use crate::gateway::Gateway;
use crate::handlers::{AllowHandler, AuthHandler, CallbackHandler, Handler, LogoutHandler};

/// Shared application state.
pub struct AppState {
    /// Configuration, codecs and provider.
    pub gateway: Gateway,
    /// The route table.
    pub router: Router<Box<dyn Handler>>,
}

impl AppState {
    /// Creates the application state, building one handler per route.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot key the cookie signer.
    pub fn new(
        config: GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ConfigError> {
        let router = Router::from_rules(
            config.rules(),
            config.default_action(),
            config.url_path(),
            config.logout_path(),
            |target| handler_for(target, &config),
        );
        info!(rules = ?router.route_names().collect::<Vec<_>>(), "built route table");

        let gateway = Gateway::new(config, provider).map_err(ConfigError::from)?;
        Ok(Self { gateway, router })
    }
}

/// Builds the axum application.
///
/// # Errors
///
/// Returns an error if the application state cannot be built.
pub fn build_app(
    config: GatewayConfig,
    provider: Arc<dyn IdentityProvider>,
) -> Result<axum::Router, ConfigError> {
    let state = Arc::new(AppState::new(config, provider)?);
    Ok(axum::Router::new()
        .fallback(forward_auth)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

fn handler_for(target: RouteTarget<'_>, config: &GatewayConfig) -> Box<dyn Handler> {
    match target {
        RouteTarget::Callback => Box::new(CallbackHandler),
        RouteTarget::Logout => Box::new(LogoutHandler),
        RouteTarget::Rule(rule) => action_handler(
            rule.action(),
            rule.policy(config.access(), config.match_mode()),
        ),
        RouteTarget::Default(action) => action_handler(
            action,
            AccessPolicy::new(config.access(), config.match_mode()),
        ),
    }
}

fn action_handler(action: RuleAction, policy: AccessPolicy) -> Box<dyn Handler> {
    match action {
        RuleAction::Auth => Box::new(AuthHandler::new(policy)),
        RuleAction::Allow => Box::new(AllowHandler),
    }
}

async fn forward_auth(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    jar: CookieJar,
) -> Response {
    let request = ForwardedRequest::from_headers(&headers, &method);
    let dispatch = state.router.dispatch(&request.route_request());

    let span = info_span!(
        "forward_auth",
        handler = dispatch.handler.name(),
        rule = %sanitize(dispatch.name),
        method = %sanitize(request.method()),
        proto = %sanitize(request.proto()),
        host = %sanitize(request.host()),
        uri = %sanitize(request.uri()),
        source_ip = %sanitize(request.source_ip()),
    );

    dispatch
        .handler
        .handle(&state.gateway, &request, jar)
        .instrument(span)
        .await
}

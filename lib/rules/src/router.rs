//! Route table and dispatch.
//!
//! Precedence, highest first:
//! 1. fixed routes (the login callback and logout), exact path on any host
//! 2. rules, by priority descending, ties in registration order
//! 3. the fallback, reported as the `default` route
//!
//! The router is generic over its handler type so it can hold whatever the
//! front end dispatches to.

use std::cmp::Reverse;

use tracing::debug;

use crate::matcher::{Matcher, RouteRequest};
use crate::rule::{Rule, RuleAction};

/// Name reported when no rule matches.
pub const DEFAULT_ROUTE: &str = "default";

/// What a handler is being built for in [`Router::from_rules`].
#[derive(Debug, Clone, Copy)]
pub enum RouteTarget<'a> {
    /// The provider callback path.
    Callback,
    /// The logout path.
    Logout,
    /// A configured rule.
    Rule(&'a Rule),
    /// The fallback for unmatched requests.
    Default(RuleAction),
}

/// The result of dispatching a request.
#[derive(Debug)]
pub struct Dispatch<'a, H> {
    /// Name of the route that matched.
    pub name: &'a str,
    /// Handler for that route.
    pub handler: &'a H,
}

#[derive(Debug)]
struct FixedRoute<H> {
    name: String,
    path: String,
    handler: H,
}

#[derive(Debug)]
struct Route<H> {
    name: String,
    priority: i64,
    matcher: Matcher,
    handler: H,
}

/// Builder for [`Router`].
#[derive(Debug)]
pub struct RouterBuilder<H> {
    fixed: Vec<FixedRoute<H>>,
    routes: Vec<Route<H>>,
}

impl<H> Default for RouterBuilder<H> {
    fn default() -> Self {
        Self {
            fixed: Vec::new(),
            routes: Vec::new(),
        }
    }
}

impl<H> RouterBuilder<H> {
    /// Adds a route matched by exact path before any rule.
    #[must_use]
    pub fn fixed(mut self, name: impl Into<String>, path: impl Into<String>, handler: H) -> Self {
        self.fixed.push(FixedRoute {
            name: name.into(),
            path: path.into(),
            handler,
        });
        self
    }

    /// Adds a rule route.
    #[must_use]
    pub fn route(
        mut self,
        name: impl Into<String>,
        priority: i64,
        matcher: Matcher,
        handler: H,
    ) -> Self {
        self.routes.push(Route {
            name: name.into(),
            priority,
            matcher,
            handler,
        });
        self
    }

    /// Finishes the table with the handler for unmatched requests.
    #[must_use]
    pub fn build(mut self, fallback: H) -> Router<H> {
        // Stable, so equal priorities keep registration order.
        self.routes.sort_by_key(|route| Reverse(route.priority));
        Router {
            fixed: self.fixed,
            routes: self.routes,
            fallback,
        }
    }
}

/// An immutable route table.
#[derive(Debug)]
pub struct Router<H> {
    fixed: Vec<FixedRoute<H>>,
    routes: Vec<Route<H>>,
    fallback: H,
}

impl<H> Router<H> {
    #[must_use]
    pub fn builder() -> RouterBuilder<H> {
        RouterBuilder::default()
    }

    /// Builds the gateway route table from compiled rules.
    ///
    /// `make` is called once per route to produce its handler.
    pub fn from_rules<F>(
        rules: &[Rule],
        default_action: RuleAction,
        callback_path: &str,
        logout_path: &str,
        mut make: F,
    ) -> Self
    where
        F: FnMut(RouteTarget<'_>) -> H,
    {
        let mut builder = Self::builder()
            .fixed("callback", callback_path, make(RouteTarget::Callback))
            .fixed("logout", logout_path, make(RouteTarget::Logout));

        for rule in rules {
            debug!(
                rule = rule.name(),
                action = %rule.action(),
                priority = rule.priority(),
                expression = rule.expression(),
                "registering rule"
            );
            builder = builder.route(
                rule.name(),
                rule.priority(),
                rule.matcher().clone(),
                make(RouteTarget::Rule(rule)),
            );
        }

        builder.build(make(RouteTarget::Default(default_action)))
    }

    /// Picks the handler for a request.
    #[must_use]
    pub fn dispatch(&self, request: &RouteRequest<'_>) -> Dispatch<'_, H> {
        if let Some(route) = self.fixed.iter().find(|route| route.path == request.path) {
            return Dispatch {
                name: &route.name,
                handler: &route.handler,
            };
        }

        if let Some(route) = self.routes.iter().find(|route| route.matcher.matches(request)) {
            return Dispatch {
                name: &route.name,
                handler: &route.handler,
            };
        }

        Dispatch {
            name: DEFAULT_ROUTE,
            handler: &self.fallback,
        }
    }

    /// Returns the rule route names in evaluation order.
    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.name.as_str())
    }
}

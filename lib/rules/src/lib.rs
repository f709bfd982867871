//! Rule matching and request routing.
//!
//! Rules are compiled once from configuration into a [`Router`], which maps
//! each forwarded request to a handler.
//!
//! # Example
//!
//! ```
//! use plex_forward_auth_rules::{RouteRequest, Router, Rule, RuleAction, RuleDefinition};
//!
//! let rules = Rule::compile_all([RuleDefinition {
//!     name: "public".to_string(),
//!     action: RuleAction::Allow,
//!     rule: "PathPrefix(`/public`)".to_string(),
//!     ..RuleDefinition::default()
//! }])
//! .unwrap();
//!
//! let router = Router::from_rules(&rules, RuleAction::Auth, "/_oauth", "/_oauth/logout", |t| {
//!     format!("{t:?}")
//! });
//!
//! let hit = router.dispatch(&RouteRequest::from_uri("GET", "a.com", "/public/x"));
//! assert_eq!(hit.name, "public");
//! ```

pub mod error;
pub mod matcher;
pub mod router;
pub mod rule;

pub use error::RuleError;
pub use matcher::{Matcher, RouteRequest};
pub use router::{DEFAULT_ROUTE, Dispatch, RouteTarget, Router, RouterBuilder};
pub use rule::{Rule, RuleAction, RuleDefinition};

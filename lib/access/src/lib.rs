//! Access policy for authenticated identities.
//!
//! After Plex has told us who the user is, each `auth` rule decides whether
//! that email may pass. See [`policy`] for the matching rules.
//!
//! # Example
//!
//! ```
//! use plex_forward_auth_access::{AccessLists, AccessPolicy, MatchMode};
//! use plex_forward_auth_core::Email;
//!
//! let global = AccessLists::new(vec![], vec!["example.com".to_string()]);
//! let rule = AccessLists::default();
//! let policy = AccessPolicy::resolve(&rule, &global, MatchMode::All);
//!
//! assert!(policy.permit(&Email::parse("alice@example.com").unwrap()));
//! assert!(!policy.permit(&Email::parse("mallory@evil.io").unwrap()));
//! ```

pub mod policy;

pub use policy::{AccessLists, AccessPolicy, MatchMode};

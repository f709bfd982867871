//! Signed, stateless cookies for plex-forward-auth.
//!
//! This crate provides:
//! - `Signer`: HMAC-SHA256 sealing keyed by the server secret
//! - `SessionCodec`: session cookies carrying the authenticated email
//! - `CsrfCodec`: short-lived state cookies for the Plex pin round trip
//! - `RedirectTarget`: post-login targets pinned to the forwarded host
//!
//! Nothing is stored server side: a cookie is trusted only if its tag
//! verifies, and expiry is reported separately from tampering.
//!
//! # Example
//!
//! ```
//! use chrono::Duration;
//! use plex_forward_auth_core::Email;
//! use plex_forward_auth_session::{SessionCodec, Signer};
//!
//! let signer = Signer::new(b"a long random secret").unwrap();
//! let codec = SessionCodec::new(signer, Duration::hours(12));
//!
//! let email = Email::parse("alice@example.com").unwrap();
//! let issued = codec.issue(&email, "example.com").unwrap();
//!
//! let session = codec.verify(&issued.value, "example.com").unwrap();
//! assert_eq!(session.email(), &email);
//! ```

pub mod csrf;
pub mod error;
pub mod redirect;
pub mod session;
pub mod signer;

pub use csrf::{CSRF_LIFETIME_MINUTES, CsrfCodec, CsrfState, IssuedCsrf};
pub use error::{CredentialError, RedirectError, SigningError};
pub use redirect::{RedirectTarget, host_without_port};
pub use session::{IssuedSession, Session, SessionCodec};
pub use signer::Signer;

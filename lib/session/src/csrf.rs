//! CSRF state cookies for the provider round trip.
//!
//! When an unauthenticated request is sent to Plex, the pending pin id and
//! the URL the user should land on afterwards are sealed into a short-lived
//! state cookie. The callback verifies it before exchanging the pin, and the
//! orchestrator clears it on every callback regardless of outcome.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, SigningError};
use crate::redirect::RedirectTarget;
use crate::signer::{Purpose, Signer};

/// State cookies live about as long as a Plex pin stays claimable.
pub const CSRF_LIFETIME_MINUTES: i64 = 10;

/// Verified state recovered from a CSRF cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfState {
    pin_id: String,
    redirect: RedirectTarget,
    expires_at: DateTime<Utc>,
}

impl CsrfState {
    /// Returns the provider pin id this flow is waiting on.
    #[must_use]
    pub fn pin_id(&self) -> &str {
        &self.pin_id
    }

    /// Returns where to send the user after login.
    #[must_use]
    pub fn redirect(&self) -> &RedirectTarget {
        &self.redirect
    }

    /// Returns when the state expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[derive(Serialize, Deserialize)]
struct CsrfClaims {
    pin: String,
    redirect: String,
    exp: i64,
}

/// A freshly sealed state cookie value.
#[derive(Debug, Clone)]
pub struct IssuedCsrf {
    /// The cookie value.
    pub value: String,
    /// When the state expires.
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies CSRF state cookie values.
#[derive(Debug, Clone)]
pub struct CsrfCodec {
    signer: Signer,
    lifetime: Duration,
}

impl CsrfCodec {
    /// Creates a codec with the default state lifetime.
    #[must_use]
    pub fn new(signer: Signer) -> Self {
        Self::with_lifetime(signer, Duration::minutes(CSRF_LIFETIME_MINUTES))
    }

    /// Creates a codec with a custom state lifetime.
    #[must_use]
    pub fn with_lifetime(signer: Signer, lifetime: Duration) -> Self {
        Self { signer, lifetime }
    }

    /// Returns the state lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Seals `pin_id` and `redirect` into a state cookie value.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn issue(
        &self,
        pin_id: &str,
        redirect: &RedirectTarget,
        cookie_domain: &str,
    ) -> Result<IssuedCsrf, SigningError> {
        self.issue_at(pin_id, redirect, cookie_domain, Utc::now())
    }

    /// Seals state as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn issue_at(
        &self,
        pin_id: &str,
        redirect: &RedirectTarget,
        cookie_domain: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedCsrf, SigningError> {
        let expires_at = DateTime::from_timestamp(now.timestamp(), 0)
            .and_then(|now| now.checked_add_signed(self.lifetime))
            .ok_or(SigningError::ExpiryOutOfRange)?;
        let claims = CsrfClaims {
            pin: pin_id.to_string(),
            redirect: redirect.as_str().to_string(),
            exp: expires_at.timestamp(),
        };
        let value = self.signer.seal(Purpose::Csrf, cookie_domain, &claims)?;
        Ok(IssuedCsrf { value, expires_at })
    }

    /// Verifies a state cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Invalid`] for anything this server did not
    /// seal (including an emptied, cleared cookie) and
    /// [`CredentialError::Expired`] for state older than the lifetime.
    pub fn verify(&self, value: &str, cookie_domain: &str) -> Result<CsrfState, CredentialError> {
        self.verify_at(value, cookie_domain, Utc::now())
    }

    /// Verifies a state cookie value as of `now`.
    ///
    /// # Errors
    ///
    /// See [`CsrfCodec::verify`].
    pub fn verify_at(
        &self,
        value: &str,
        cookie_domain: &str,
        now: DateTime<Utc>,
    ) -> Result<CsrfState, CredentialError> {
        let claims: CsrfClaims = self.signer.open(Purpose::Csrf, cookie_domain, value)?;

        if claims.pin.is_empty() {
            return Err(CredentialError::invalid("empty pin id"));
        }
        let redirect = RedirectTarget::parse(&claims.redirect)
            .map_err(|_| CredentialError::invalid("bad redirect target"))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| CredentialError::invalid("bad expiry"))?;
        if now >= expires_at {
            return Err(CredentialError::Expired { expired_at: expires_at });
        }

        Ok(CsrfState {
            pin_id: claims.pin,
            redirect,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionCodec;
    use plex_forward_auth_core::Email;

    const DOMAIN: &str = "app.example.com";

    fn signer() -> Signer {
        Signer::new(b"csrf-secret").expect("signer")
    }

    fn target() -> RedirectTarget {
        RedirectTarget::from_forwarded("https", DOMAIN, "/movies?page=2").expect("target")
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
    }

    #[test]
    fn round_trip() {
        let codec = CsrfCodec::new(signer());
        let issued = codec.issue_at("123456", &target(), DOMAIN, t0()).expect("issue");
        assert_eq!(issued.expires_at, t0() + Duration::minutes(CSRF_LIFETIME_MINUTES));

        let state = codec
            .verify_at(&issued.value, DOMAIN, t0() + Duration::minutes(1))
            .expect("verify");
        assert_eq!(state.pin_id(), "123456");
        assert_eq!(state.redirect(), &target());
        assert_eq!(state.expires_at(), issued.expires_at);
    }

    #[test]
    fn expires_after_pin_window() {
        let codec = CsrfCodec::new(signer());
        let issued = codec.issue_at("123456", &target(), DOMAIN, t0()).expect("issue");
        let err = codec
            .verify_at(&issued.value, DOMAIN, t0() + Duration::minutes(11))
            .unwrap_err();
        assert!(err.is_expired());
    }

    #[test]
    fn tampered_state_is_invalid() {
        let codec = CsrfCodec::new(signer());
        let issued = codec.issue_at("123456", &target(), DOMAIN, t0()).expect("issue");
        let mut bytes = issued.value.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = if bytes[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(bytes).expect("ascii");
        assert!(matches!(
            codec.verify_at(&tampered, DOMAIN, t0()),
            Err(CredentialError::Invalid { .. })
        ));
    }

    #[test]
    fn cleared_cookie_value_fails() {
        let codec = CsrfCodec::new(signer());
        assert!(matches!(
            codec.verify_at("", DOMAIN, t0()),
            Err(CredentialError::Invalid { .. })
        ));
    }

    #[test]
    fn session_value_is_not_state() {
        let sessions = SessionCodec::new(signer(), Duration::hours(1));
        let email = Email::parse("u@example.com").expect("email");
        let issued = sessions.issue_at(&email, DOMAIN, t0()).expect("issue");

        let codec = CsrfCodec::new(signer());
        assert!(matches!(
            codec.verify_at(&issued.value, DOMAIN, t0()),
            Err(CredentialError::Invalid { .. })
        ));
    }

    #[test]
    fn stored_target_stays_on_forwarded_host() {
        let codec = CsrfCodec::new(signer());
        let redirect =
            RedirectTarget::from_forwarded("https", DOMAIN, "//evil.com/phish").expect("target");
        let issued = codec.issue_at("1", &redirect, DOMAIN, t0()).expect("issue");
        let state = codec.verify_at(&issued.value, DOMAIN, t0()).expect("verify");
        assert_eq!(state.redirect().host(), DOMAIN);
        assert!(!state.redirect().as_str().contains("evil.com"));
    }
}

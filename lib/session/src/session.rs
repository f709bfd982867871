//! Signed session cookies.
//!
//! A session is created after a successful provider callback and lives
//! entirely inside the cookie: there is no server-side store. The cookie
//! carries the authenticated email, when it was issued and when it expires,
//! sealed with the server secret (see [`crate::signer`]).

use chrono::{DateTime, Duration, Utc};
use plex_forward_auth_core::Email;
use serde::{Deserialize, Serialize};

use crate::error::{CredentialError, SigningError};
use crate::signer::{Purpose, Signer};

/// An authenticated session recovered from (or about to be sealed into) a
/// cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The authenticated user's email.
    email: Email,
    /// When the session was issued.
    issued_at: DateTime<Utc>,
    /// When the session expires.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Returns the authenticated email.
    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Returns when the session was issued.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Wire form of the session payload.
#[derive(Serialize, Deserialize)]
struct SessionClaims {
    email: String,
    iat: i64,
    exp: i64,
}

/// A freshly sealed session cookie value.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// The cookie value.
    pub value: String,
    /// The session it carries.
    pub session: Session,
}

/// Issues and verifies session cookie values.
#[derive(Debug, Clone)]
pub struct SessionCodec {
    signer: Signer,
    lifetime: Duration,
}

impl SessionCodec {
    /// Creates a codec issuing sessions valid for `lifetime`.
    #[must_use]
    pub fn new(signer: Signer, lifetime: Duration) -> Self {
        Self { signer, lifetime }
    }

    /// Returns the configured session lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a session for `email`, bound to `cookie_domain`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded.
    pub fn issue(&self, email: &Email, cookie_domain: &str) -> Result<IssuedSession, SigningError> {
        self.issue_at(email, cookie_domain, Utc::now())
    }

    /// Issues a session as of `now`. Timestamps are truncated to seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be encoded or the expiry is
    /// past the representable date range.
    pub fn issue_at(
        &self,
        email: &Email,
        cookie_domain: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SigningError> {
        let iat = now.timestamp();
        let issued_at = timestamp(iat).ok_or(SigningError::ExpiryOutOfRange)?;
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or(SigningError::ExpiryOutOfRange)?;
        let claims = SessionClaims {
            email: email.as_str().to_string(),
            iat,
            exp: expires_at.timestamp(),
        };
        let value = self.signer.seal(Purpose::Session, cookie_domain, &claims)?;

        let session = Session {
            email: email.clone(),
            issued_at,
            expires_at,
        };
        Ok(IssuedSession { value, session })
    }

    /// Verifies a session cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Invalid`] if the value was not sealed by
    /// this server for `cookie_domain`, and [`CredentialError::Expired`] if
    /// it was but has expired.
    pub fn verify(&self, value: &str, cookie_domain: &str) -> Result<Session, CredentialError> {
        self.verify_at(value, cookie_domain, Utc::now())
    }

    /// Verifies a session cookie value as of `now`.
    ///
    /// # Errors
    ///
    /// See [`SessionCodec::verify`].
    pub fn verify_at(
        &self,
        value: &str,
        cookie_domain: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, CredentialError> {
        let claims: SessionClaims = self.signer.open(Purpose::Session, cookie_domain, value)?;

        let email =
            Email::parse(claims.email).map_err(|_| CredentialError::invalid("bad email"))?;
        let issued_at =
            timestamp(claims.iat).ok_or_else(|| CredentialError::invalid("bad issued-at"))?;
        let expires_at =
            timestamp(claims.exp).ok_or_else(|| CredentialError::invalid("bad expiry"))?;

        let session = Session {
            email,
            issued_at,
            expires_at,
        };
        if session.is_expired_at(now) {
            return Err(CredentialError::Expired { expired_at: expires_at });
        }
        Ok(session)
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

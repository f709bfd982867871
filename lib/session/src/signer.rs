//! HMAC-SHA256 sealing shared by the session and CSRF codecs.
//!
//! A sealed value is `<tag>.<payload>`:
//! - `payload` is the base64url (unpadded) JSON encoding of the claims
//! - `tag` is the base64url (unpadded) HMAC over the purpose label, the
//!   cookie domain and the encoded payload; always [`TAG_LEN`] characters
//!
//! Neither half can contain `.`, so a value splits in exactly one way.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::Sha256;
use std::fmt;

use crate::error::{CredentialError, SigningError};

type HmacSha256 = Hmac<Sha256>;

/// Encoded length of a SHA-256 tag in unpadded base64url.
pub const TAG_LEN: usize = 43;

/// What a sealed value is for. Part of the signed input, so a value sealed
/// for one purpose never opens as another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Purpose {
    Session,
    Csrf,
}

impl Purpose {
    fn label(self) -> &'static [u8] {
        match self {
            Self::Session => b"session",
            Self::Csrf => b"csrf",
        }
    }
}

/// Keyed signer holding the server secret.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    /// Creates a signer from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::EmptySecret`] if `secret` is empty.
    pub fn new(secret: &[u8]) -> Result<Self, SigningError> {
        if secret.is_empty() {
            return Err(SigningError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| SigningError::EmptySecret)?;
        Ok(Self { mac })
    }

    fn keyed(&self, purpose: Purpose, domain: &str, payload: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(purpose.label());
        mac.update(&[0]);
        mac.update(domain.as_bytes());
        mac.update(&[0]);
        mac.update(payload.as_bytes());
        mac
    }

    pub(crate) fn seal<T: Serialize>(
        &self,
        purpose: Purpose,
        domain: &str,
        claims: &T,
    ) -> Result<String, SigningError> {
        let json = serde_json::to_vec(claims).map_err(|e| SigningError::Encode {
            reason: e.to_string(),
        })?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let tag = self.keyed(purpose, domain, &payload).finalize().into_bytes();
        Ok(format!("{}.{payload}", URL_SAFE_NO_PAD.encode(tag)))
    }

    /// Verifies the tag before decoding anything from the payload.
    pub(crate) fn open<T: DeserializeOwned>(
        &self,
        purpose: Purpose,
        domain: &str,
        value: &str,
    ) -> Result<T, CredentialError> {
        let (tag, payload) = value
            .split_once('.')
            .ok_or_else(|| CredentialError::invalid("missing separator"))?;
        if tag.len() != TAG_LEN {
            return Err(CredentialError::invalid("bad tag length"));
        }
        let tag = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| CredentialError::invalid("bad tag encoding"))?;

        // verify_slice compares in constant time
        self.keyed(purpose, domain, payload)
            .verify_slice(&tag)
            .map_err(|_| CredentialError::invalid("signature mismatch"))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| CredentialError::invalid("bad payload encoding"))?;
        serde_json::from_slice(&json).map_err(|_| CredentialError::invalid("bad payload"))
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

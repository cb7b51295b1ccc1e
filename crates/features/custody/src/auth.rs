//! The session-credential black box.
//!
//! Callers authenticate with a bearer credential bound to their identity.
//! The signing key is generated at startup and never leaves the process;
//! a restart invalidates outstanding credentials, which simply forces
//! clients through re-establishment.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::CustodyError;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    iat: u64,
    exp: u64,
}

struct AuthorityInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

/// Issues and verifies the bearer credentials that bind a caller to an
/// identity.
#[derive(Clone)]
pub struct CredentialAuthority {
    inner: Arc<AuthorityInner>,
}

impl std::fmt::Debug for CredentialAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialAuthority")
            .field("issuer", &self.inner.issuer)
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

impl CredentialAuthority {
    /// Creates an authority with a freshly generated HS256 signing key.
    ///
    /// # Errors
    /// Returns [`CustodyError::Internal`] if the system RNG is
    /// unavailable.
    pub fn init(issuer: impl Into<String>, ttl: Duration) -> Result<Self, CustodyError> {
        let mut key = [0u8; 32];
        getrandom::fill(&mut key).map_err(|e| CustodyError::Internal {
            message: e.to_string().into(),
            context: Some("credential signing key generation".into()),
        })?;

        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&issuer]);

        Ok(Self {
            inner: Arc::new(AuthorityInner {
                encoding: EncodingKey::from_secret(&key),
                decoding: DecodingKey::from_secret(&key),
                validation,
                issuer,
                ttl,
            }),
        })
    }

    /// Issues a credential bound to `identity`.
    ///
    /// # Errors
    /// Returns [`CustodyError::Internal`] if signing fails.
    pub fn issue(&self, identity: &str) -> Result<String, CustodyError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: identity.to_owned(),
            iss: self.inner.issuer.clone(),
            iat: now,
            exp: now + self.inner.ttl.as_secs(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.inner.encoding).map_err(|e| {
            CustodyError::Internal {
                message: e.to_string().into(),
                context: Some("credential signing".into()),
            }
        })
    }

    /// Verifies a credential and returns the identity it is bound to.
    ///
    /// # Errors
    /// Returns [`CustodyError::CredentialInvalid`] for anything the
    /// verifier rejects: bad signature, expiry, wrong issuer, garbage.
    pub fn verify(&self, credential: &str) -> Result<String, CustodyError> {
        jsonwebtoken::decode::<Claims>(credential, &self.inner.decoding, &self.inner.validation)
            .map(|data| data.claims.sub)
            .map_err(|_| CustodyError::CredentialInvalid {
                message: "credential failed verification".into(),
                context: None,
            })
    }
}

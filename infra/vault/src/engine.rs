use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

use crate::cipher;
use crate::error::VaultError;
use crate::types::{AtRest, AuthTag, ServerSecret, SharedSecret, TAG_LEN, Transit};

type HmacSha256 = Hmac<Sha256>;

fn keyed_mac(key: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(key).expect("HMAC-SHA-256 accepts keys of any length")
}

fn compute_tag(ciphertext: &[u8], key: &[u8]) -> [u8; TAG_LEN] {
    let mut mac = keyed_mac(key);
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

/// Computes the transit tag for a ciphertext: HMAC-SHA-256 keyed by the
/// *raw* shared secret (not the derived encryption key).
#[must_use]
pub fn transit_tag(ciphertext: &[u8], secret: &SharedSecret) -> AuthTag<Transit> {
    AuthTag::from_bytes(compute_tag(ciphertext, secret.as_bytes()))
}

/// Verifies a transit tag in constant time.
///
/// # Errors
/// Returns [`VaultError::TransitTagMismatch`] if the tag does not
/// authenticate the ciphertext under this secret. The ciphertext must
/// then be discarded without decryption.
pub fn verify_transit(
    ciphertext: &[u8],
    secret: &SharedSecret,
    tag: &AuthTag<Transit>,
) -> Result<(), VaultError> {
    let mut mac = keyed_mac(secret.as_bytes());
    mac.update(ciphertext);
    mac.verify_slice(tag.as_bytes()).map_err(|_| VaultError::TransitTagMismatch {
        message: "ciphertext does not match its transit tag".into(),
        context: None,
    })
}

#[derive(Debug)]
struct VaultInner {
    server_secret: ServerSecret,
}

/// Holder of the process-wide at-rest key.
///
/// `Vault` wraps the [`ServerSecret`] in an [`Arc`], making it cheaply
/// clonable into request handlers and background tasks. It is the only
/// component allowed to compute or verify at-rest tags.
///
/// ### Example
/// ```rust
/// use sanctum_vault::{SharedSecret, Vault};
///
/// # fn main() -> Result<(), sanctum_vault::VaultError> {
/// let vault = Vault::generate()?;
/// let secret = SharedSecret::generate()?;
/// let identity = "frXPQ2NjbWp5kTz84hGwRsAe";
///
/// let (ciphertext, tag) = vault.reseal("payload", &secret, identity)?;
/// vault.verify_at_rest(&ciphertext, &tag)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Vault {
    inner: Arc<VaultInner>,
}

impl Vault {
    /// Creates a vault around a freshly generated [`ServerSecret`].
    ///
    /// # Errors
    /// Returns [`VaultError::RandomSource`] if the system RNG is
    /// unavailable.
    pub fn generate() -> Result<Self, VaultError> {
        Ok(Self::with_secret(ServerSecret::generate()?))
    }

    /// Creates a vault around an explicit secret.
    #[must_use]
    pub fn with_secret(server_secret: ServerSecret) -> Self {
        Self { inner: Arc::new(VaultInner { server_secret }) }
    }

    /// Computes the at-rest tag for a ciphertext: HMAC-SHA-256 keyed by
    /// the server-wide secret, independent of any per-session material.
    #[must_use]
    pub fn at_rest_tag(&self, ciphertext: &[u8]) -> AuthTag<AtRest> {
        AuthTag::from_bytes(compute_tag(ciphertext, self.inner.server_secret.as_bytes()))
    }

    /// Verifies an at-rest tag in constant time.
    ///
    /// # Errors
    /// Returns [`VaultError::AtRestTagMismatch`] if the tag does not
    /// authenticate the ciphertext under the server secret. On the read
    /// path this is the tampering signal.
    pub fn verify_at_rest(
        &self,
        ciphertext: &[u8],
        tag: &AuthTag<AtRest>,
    ) -> Result<(), VaultError> {
        let mut mac = keyed_mac(self.inner.server_secret.as_bytes());
        mac.update(ciphertext);
        mac.verify_slice(tag.as_bytes()).map_err(|_| VaultError::AtRestTagMismatch {
            message: "stored payload does not match its at-rest tag".into(),
            context: None,
        })
    }

    /// Deterministically re-encrypts a payload under its session material
    /// and tags the result for rest.
    ///
    /// This is the shared building block of the save path (tag what the
    /// client sent) and the self-heal path (re-tag the promoted backup).
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidIdentity`] if the identity cannot
    /// provide IV material.
    pub fn reseal(
        &self,
        payload: &str,
        secret: &SharedSecret,
        identity: &str,
    ) -> Result<(Vec<u8>, AuthTag<AtRest>), VaultError> {
        let key = cipher::derive_key(secret);
        let iv = cipher::derive_iv(identity)?;
        let ciphertext = cipher::encrypt(payload.as_bytes(), &key, &iv);
        let tag = self.at_rest_tag(&ciphertext);
        Ok((ciphertext, tag))
    }
}

use crate::error::VaultError;
use std::marker::PhantomData;
use zeroize::{Zeroize, ZeroizeOnDrop};

// --- Lengths ---

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// AES block / CBC IV length.
pub const IV_LEN: usize = 16;

/// HMAC-SHA-256 tag length.
pub const TAG_LEN: usize = 32;

/// Raw length of a shared or server secret.
pub const SECRET_LEN: usize = 32;

// --- Tag domains ---

mod private {
    pub trait Sealed {}
    impl Sealed for super::Transit {}
    impl Sealed for super::AtRest {}
}

/// Marker for a tag domain. Sealed; the two domains are [`Transit`] and
/// [`AtRest`] and must never be conflated.
pub trait TagKind: private::Sealed + 'static {
    /// Human-readable domain label used in diagnostics.
    const LABEL: &'static str;
}

/// Tags authenticating data in flight, keyed by the raw session secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transit;

/// Tags authenticating data at rest, keyed by the server-wide secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtRest;

impl TagKind for Transit {
    const LABEL: &'static str = "transit";
}

impl TagKind for AtRest {
    const LABEL: &'static str = "at-rest";
}

// --- Authentication tag ---

/// A domain-bound HMAC-SHA-256 authentication tag.
///
/// The `K` parameter pins the tag to the domain it was computed in, so a
/// transit tag cannot be handed to an at-rest verifier by accident.
///
/// Equality on `AuthTag` is byte equality and is **not** constant-time;
/// verification must go through [`verify_transit`](crate::verify_transit)
/// or [`Vault::verify_at_rest`](crate::Vault::verify_at_rest).
pub struct AuthTag<K> {
    bytes: [u8; TAG_LEN],
    _kind: PhantomData<K>,
}

impl<K: TagKind> AuthTag<K> {
    /// Wraps raw tag bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; TAG_LEN]) -> Self {
        Self { bytes, _kind: PhantomData }
    }

    /// Parses a tag from its lowercase-hex wire form.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidTag`] if the input is not hex or not
    /// exactly [`TAG_LEN`] bytes.
    pub fn from_hex(text: &str) -> Result<Self, VaultError> {
        let raw = hex::decode(text).map_err(|_| VaultError::InvalidTag {
            message: "tag is not valid hex".into(),
            context: Some(K::LABEL.into()),
        })?;
        let bytes: [u8; TAG_LEN] = raw.try_into().map_err(|_| VaultError::InvalidTag {
            message: "tag has wrong length".into(),
            context: Some(K::LABEL.into()),
        })?;
        Ok(Self::from_bytes(bytes))
    }

    /// Returns the lowercase-hex wire form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Returns the raw tag bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.bytes
    }
}

impl<K> Clone for AuthTag<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for AuthTag<K> {}

impl<K> PartialEq for AuthTag<K> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<K> Eq for AuthTag<K> {}

impl<K: TagKind> std::fmt::Debug for AuthTag<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTag")
            .field("kind", &K::LABEL)
            .field("hex", &hex::encode(self.bytes))
            .finish()
    }
}

// --- Secrets ---

/// Per-session symmetric key material shared between client and server.
///
/// High-entropy random bytes; the transit HMAC keys off the raw value and
/// the encryption key is derived from it. Zeroed on drop, redacted in
/// `Debug` output — this value must never reach logs or error strings.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: [u8; SECRET_LEN],
}

impl SharedSecret {
    /// Generates a fresh random secret from the system RNG.
    ///
    /// # Errors
    /// Returns [`VaultError::RandomSource`] if the system RNG is
    /// unavailable.
    pub fn generate() -> Result<Self, VaultError> {
        let mut bytes = [0u8; SECRET_LEN];
        getrandom::fill(&mut bytes).map_err(|e| VaultError::RandomSource {
            message: e.to_string().into(),
            context: Some("shared secret generation".into()),
        })?;
        Ok(Self { bytes })
    }

    /// Parses a secret from its lowercase-hex wire form.
    ///
    /// # Errors
    /// Returns [`VaultError::InvalidSecret`] if the input is not hex or
    /// not exactly [`SECRET_LEN`] bytes.
    pub fn from_hex(text: &str) -> Result<Self, VaultError> {
        let raw = hex::decode(text).map_err(|_| VaultError::InvalidSecret {
            message: "secret is not valid hex".into(),
            context: None,
        })?;
        let bytes: [u8; SECRET_LEN] = raw.try_into().map_err(|_| VaultError::InvalidSecret {
            message: "secret has wrong length".into(),
            context: None,
        })?;
        Ok(Self { bytes })
    }

    /// Returns the lowercase-hex wire form.
    ///
    /// The hex form exists only to cross the session-establishment
    /// response; it must not be persisted or logged.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Returns the raw secret bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Process-wide secret keying the at-rest tag domain.
///
/// Generated once at startup, never persisted, never exposed. Losing it
/// across a restart invalidates every previously stored at-rest tag, which
/// is an accepted property: affected records heal from backup or expire.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ServerSecret {
    bytes: [u8; SECRET_LEN],
}

impl ServerSecret {
    /// Generates the process secret from the system RNG.
    ///
    /// # Errors
    /// Returns [`VaultError::RandomSource`] if the system RNG is
    /// unavailable.
    pub fn generate() -> Result<Self, VaultError> {
        let mut bytes = [0u8; SECRET_LEN];
        getrandom::fill(&mut bytes).map_err(|e| VaultError::RandomSource {
            message: e.to_string().into(),
            context: Some("server secret generation".into()),
        })?;
        Ok(Self { bytes })
    }

    /// Wraps fixed secret bytes. Intended for tests that need a
    /// deterministic at-rest key.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SECRET_LEN]) -> Self {
        Self { bytes }
    }

    pub(crate) const fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for ServerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServerSecret(..)")
    }
}

//! Cryptographic primitives for the protected-data pipeline.
//!
//! Two independent protection layers are provided, each keyed by its own
//! secret:
//!
//! * **Transit**: AES-256-CBC encryption under a key derived from the
//!   per-session shared secret, authenticated by an HMAC-SHA-256 tag keyed
//!   by the *raw* shared secret. Protects data on the wire between client
//!   and server.
//! * **At rest**: an HMAC-SHA-256 tag keyed by the process-wide
//!   [`ServerSecret`], computed over the deterministic re-encryption of the
//!   stored payload. Protects stored data against storage-layer tampering,
//!   independent of any session, for as long as the session that wrote it
//!   is still resolvable.
//!
//! The two tag domains are distinct marker types ([`Transit`] and
//! [`AtRest`]); mixing them up is a compile error, and each failure is
//! reported through its own error variant.
//!
//! ## Determinism
//!
//! Encryption is deliberately deterministic: the key is derived from the
//! shared secret alone and the IV from the session identity alone, so the
//! server can re-encrypt a stored payload and compare authentication tags.
//! The flip side is that two *different* plaintexts sealed under the same
//! identity+secret pair reuse an IV. The protocol therefore treats the
//! store as a single logical slot per session; callers replacing the slot
//! content mid-session are expected to announce it (see the client crate).
//!
//! ## Example
//!
//! ```rust
//! use sanctum_vault::{SharedSecret, cipher, transit_tag, verify_transit};
//!
//! # fn main() -> Result<(), sanctum_vault::VaultError> {
//! let secret = SharedSecret::generate()?;
//! let identity = "frXPQ2NjbWp5kTz84hGwRsAe";
//!
//! let key = cipher::derive_key(&secret);
//! let iv = cipher::derive_iv(identity)?;
//!
//! let ciphertext = cipher::encrypt(b"attack at dawn", &key, &iv);
//! let tag = transit_tag(&ciphertext, &secret);
//!
//! verify_transit(&ciphertext, &secret, &tag)?;
//! assert_eq!(cipher::decrypt(&ciphertext, &key, &iv)?, b"attack at dawn");
//! # Ok(())
//! # }
//! ```

pub mod cipher;
mod engine;
mod error;
mod types;

pub use engine::{Vault, transit_tag, verify_transit};
pub use error::{VaultError, VaultErrorExt};
pub use types::{
    AtRest, AuthTag, IV_LEN, KEY_LEN, SECRET_LEN, ServerSecret, SharedSecret, TAG_LEN, TagKind,
    Transit,
};

pub mod prelude {
    pub use crate::cipher;
    pub use crate::engine::{Vault, transit_tag, verify_transit};
    pub use crate::error::{VaultError, VaultErrorExt};
    pub use crate::types::{AtRest, AuthTag, ServerSecret, SharedSecret, Transit};
}

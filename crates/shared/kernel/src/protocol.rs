//! Wire protocol types shared by the server slice and the client.
//!
//! All cryptographic values cross the wire as text: ciphertext is
//! standard base64, tags and secrets are lowercase hex. Raw binary never
//! appears in a request or response body.

use serde::{Deserialize, Serialize};

/// A ciphertext and the transit tag authenticating it.
///
/// The same shape travels in both directions: the save request body and
/// the retrieve response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct Envelope {
    /// Base64-encoded ciphertext.
    pub ciphertext: String,
    /// Hex-encoded transit tag over the ciphertext bytes.
    pub tag: String,
}

/// Result of session establishment.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct SessionGrant {
    /// Opaque session identity; also the client's IV material.
    pub identity: String,
    /// Hex-encoded shared secret. Handed over exactly once, here.
    pub shared_secret: String,
    /// Bearer credential to present on subsequent calls.
    pub credential: String,
}

impl std::fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGrant")
            .field("identity", &self.identity)
            .field("shared_secret", &"..")
            .field("credential", &"..")
            .finish()
    }
}

/// Machine-checkable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    /// Stable error code, e.g. `session_expired`.
    pub code: String,
    pub message: String,
}

/// Disaster-recovery request: directly replace the backup copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct BackupRestoreRequest {
    /// Plaintext payload to install as the new backup.
    pub payload: String,
}

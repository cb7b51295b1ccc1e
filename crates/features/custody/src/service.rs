//! The server-side protected-data protocol.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sanctum_kernel::protocol::Envelope;
use sanctum_store::{EstablishedSession, RecordStore, SessionStore};
use sanctum_vault::{
    AuthTag, SharedSecret, Transit, Vault, VaultError, cipher, transit_tag, verify_transit,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::CustodyError;

#[derive(Debug)]
struct CustodyInner {
    sessions: SessionStore,
    records: RecordStore,
    vault: Vault,
}

/// The custody service: session lifecycle, the save path, and the read
/// path with tamper detection and transparent self-healing.
///
/// Cheaply clonable; all state lives behind an [`Arc`].
#[derive(Debug, Clone)]
pub struct Custody {
    inner: Arc<CustodyInner>,
}

impl Custody {
    #[must_use]
    pub fn new(sessions: SessionStore, records: RecordStore, vault: Vault) -> Self {
        Self { inner: Arc::new(CustodyInner { sessions, records, vault }) }
    }

    /// Issues a fresh identity and shared secret.
    ///
    /// # Errors
    /// Returns [`CustodyError::StoreUnavailable`] if the session store
    /// cannot take the write.
    pub fn establish_session(&self) -> Result<EstablishedSession, CustodyError> {
        Ok(self.inner.sessions.establish()?)
    }

    /// Destroys a session ahead of its natural expiry.
    ///
    /// # Errors
    /// Returns [`CustodyError::StoreUnavailable`] on store failure.
    pub fn clear_session(&self, identity: &str) -> Result<(), CustodyError> {
        self.inner.sessions.invalidate(identity)?;
        Ok(())
    }

    /// Accepts an envelope from the wire and stores its payload.
    ///
    /// Order matters: the transit tag is verified before anything is
    /// decrypted, and nothing is stored unless every step succeeds.
    ///
    /// # Errors
    /// * [`CustodyError::SessionExpired`] — no live secret for the caller.
    /// * [`CustodyError::MalformedEnvelope`] — undecodable ciphertext/tag.
    /// * [`CustodyError::TransitTagMismatch`] — wire tampering.
    /// * [`CustodyError::Decryption`] — valid tag over undecryptable
    ///   ciphertext; a client defect.
    /// * [`CustodyError::StoreUnavailable`] — store failure.
    pub fn save(&self, identity: &str, envelope: &Envelope) -> Result<(), CustodyError> {
        let secret = self.resolve_secret(identity)?;

        let ciphertext = decode_ciphertext(&envelope.ciphertext)?;
        let tag = AuthTag::<Transit>::from_hex(&envelope.tag)?;
        verify_transit(&ciphertext, &secret, &tag)?;

        let key = cipher::derive_key(&secret);
        let iv = cipher::derive_iv(identity).map_err(internal)?; // identity came from a verified credential
        let plaintext = cipher::decrypt(&ciphertext, &key, &iv).inspect_err(|_| {
            // A valid transit tag over undecryptable bytes means the
            // client encrypted with mismatched material.
            error!(identity, "Authenticated ciphertext failed to decrypt");
        })?;
        let payload = String::from_utf8(plaintext).map_err(|_| CustodyError::Decryption {
            message: "decrypted payload is not valid UTF-8".into(),
            context: None,
        })?;

        let at_rest = self.inner.vault.at_rest_tag(&ciphertext);
        self.inner.records.save(identity, &payload, at_rest)?;

        debug!(identity, "Payload saved");
        Ok(())
    }

    /// Serves the stored payload back as a tagged envelope, verifying
    /// at-rest integrity on the way and self-healing from backup when the
    /// check fails.
    ///
    /// A caller cannot distinguish "never tampered" from "tampered and
    /// repaired"; only the server log records the event.
    ///
    /// # Errors
    /// * [`CustodyError::SessionExpired`] — no live secret for the caller.
    /// * [`CustodyError::DataMissing`] — nothing stored; save first.
    /// * [`CustodyError::DataTamperedNoBackup`] — tampering detected and
    ///   no backup to heal from; terminal for this identity's data.
    /// * [`CustodyError::StoreUnavailable`] — store failure.
    pub fn retrieve(&self, identity: &str) -> Result<Envelope, CustodyError> {
        let secret = self.resolve_secret(identity)?;

        let Some(primary) = self.inner.records.read_primary(identity)? else {
            return Err(CustodyError::DataMissing {
                message: "no record for this identity".into(),
                context: None,
            });
        };

        let (ciphertext, _) =
            self.inner.vault.reseal(&primary.payload, &secret, identity).map_err(internal)?;

        let ciphertext = match self.inner.vault.verify_at_rest(&ciphertext, &primary.tag) {
            Ok(()) => ciphertext,
            Err(VaultError::AtRestTagMismatch { .. }) => {
                warn!(identity, "At-rest integrity check failed; promoting backup");
                self.self_heal(identity, &secret)?
            },
            Err(other) => return Err(internal(other)),
        };

        let tag = transit_tag(&ciphertext, &secret);
        Ok(Envelope { ciphertext: BASE64.encode(&ciphertext), tag: tag.to_hex() })
    }

    /// Disaster recovery: replace the backup copy directly.
    ///
    /// # Errors
    /// Returns [`CustodyError::StoreUnavailable`] on store failure.
    pub fn restore_backup(&self, identity: &str, payload: &str) -> Result<(), CustodyError> {
        self.inner.records.restore_backup(identity, payload)?;
        info!(identity, "Backup overwritten via disaster recovery");
        Ok(())
    }

    /// Promotes the backup, re-tags it, and returns the recomputed
    /// ciphertext for the healed payload.
    fn self_heal(
        &self,
        identity: &str,
        secret: &SharedSecret,
    ) -> Result<Vec<u8>, CustodyError> {
        let Some(payload) = self.inner.records.read_backup(identity)? else {
            return Err(CustodyError::DataTamperedNoBackup {
                message: "primary is tampered and no backup exists".into(),
                context: None,
            });
        };

        let (ciphertext, fresh_tag) =
            self.inner.vault.reseal(&payload, secret, identity).map_err(internal)?;

        if self.inner.records.promote_backup(identity, fresh_tag)?.is_none() {
            return Err(CustodyError::DataTamperedNoBackup {
                message: "backup disappeared during promotion".into(),
                context: None,
            });
        }

        info!(identity, "Record self-healed from backup");
        Ok(ciphertext)
    }

    fn resolve_secret(&self, identity: &str) -> Result<Arc<SharedSecret>, CustodyError> {
        self.inner.sessions.lookup(identity)?.ok_or_else(|| CustodyError::SessionExpired {
            message: "no live session for this identity".into(),
            context: None,
        })
    }
}

fn decode_ciphertext(text: &str) -> Result<Vec<u8>, CustodyError> {
    BASE64.decode(text).map_err(|_| CustodyError::MalformedEnvelope {
        message: "ciphertext is not valid base64".into(),
        context: None,
    })
}

fn internal(err: VaultError) -> CustodyError {
    CustodyError::Internal { message: err.to_string().into(), context: None }
}

//! Primary/backup record pairs with atomic writes.
//!
//! A record pair is held as one slot value in the cache, so every write
//! replaces primary and backup in a single atomic swap: a concurrent
//! reader sees either the whole old pair or the whole new pair, never a
//! mixture.

use crate::error::StoreError;
use moka::sync::Cache;
use sanctum_vault::{AtRest, AuthTag};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The authoritative copy: payload plus the at-rest tag that must keep
/// authenticating its deterministic re-encryption.
#[derive(Debug, Clone)]
pub struct PrimaryRecord {
    pub payload: String,
    pub tag: AuthTag<AtRest>,
}

/// One identity's stored state. Primary and backup live and die together
/// in the slot; either may be individually absent (a restore can seed a
/// backup before any save, promotion requires a backup).
#[derive(Debug)]
struct RecordSlot {
    primary: Option<PrimaryRecord>,
    backup: Option<String>,
}

/// The record store: one primary/backup slot per identity, expiring
/// `record_ttl` after the last write, independent of the session TTL.
///
/// Internally reference-counted; clone freely into handlers.
#[derive(Clone)]
pub struct RecordStore {
    cache: Cache<String, Arc<RecordSlot>>,
    ttl: Duration,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("ttl", &self.ttl)
            .field("slots", &self.cache.entry_count())
            .finish()
    }
}

impl RecordStore {
    /// Creates a store whose slots live `ttl` past their last write.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder().max_capacity(capacity).time_to_live(ttl).build();
        Self { cache, ttl }
    }

    /// Atomically writes the pair: primary {payload, tag} and backup
    /// {payload}. A reader never observes one half updated without the
    /// other.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn save(
        &self,
        identity: &str,
        payload: &str,
        tag: AuthTag<AtRest>,
    ) -> Result<(), StoreError> {
        let slot = RecordSlot {
            primary: Some(PrimaryRecord { payload: payload.to_owned(), tag }),
            backup: Some(payload.to_owned()),
        };
        self.cache.insert(identity.to_owned(), Arc::new(slot));
        debug!(identity, "Record pair saved");
        Ok(())
    }

    /// Reads the primary record; `Ok(None)` when absent or expired.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn read_primary(&self, identity: &str) -> Result<Option<PrimaryRecord>, StoreError> {
        Ok(self.cache.get(identity).and_then(|slot| slot.primary.clone()))
    }

    /// Reads the backup payload; `Ok(None)` when absent or expired.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn read_backup(&self, identity: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.get(identity).and_then(|slot| slot.backup.clone()))
    }

    /// Rewrites the slot from its own backup payload under a fresh tag
    /// and returns that payload — the self-heal primitive.
    ///
    /// The caller computes `fresh_tag` from the backup payload it just
    /// read (one identity has one writer, so the payload cannot change
    /// underneath). Idempotent: with no intervening writes, repeated
    /// promotion reproduces the same stored state.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn promote_backup(
        &self,
        identity: &str,
        fresh_tag: AuthTag<AtRest>,
    ) -> Result<Option<String>, StoreError> {
        let Some(payload) = self.read_backup(identity)? else {
            return Ok(None);
        };

        self.save(identity, &payload, fresh_tag)?;
        debug!(identity, "Backup promoted to primary");
        Ok(Some(payload))
    }

    /// Disaster recovery: directly replaces the backup copy, leaving the
    /// primary untouched. The only write path that moves one half of the
    /// pair without the other. Refreshes the slot's TTL.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn restore_backup(&self, identity: &str, payload: &str) -> Result<(), StoreError> {
        let primary = self.cache.get(identity).and_then(|slot| slot.primary.clone());
        let slot = RecordSlot { primary, backup: Some(payload.to_owned()) };
        self.cache.insert(identity.to_owned(), Arc::new(slot));
        debug!(identity, "Backup restored");
        Ok(())
    }
}

/// Storage-attacker simulation, available with the `test-util` feature.
/// These bypass the save invariants on purpose; nothing in the serving
/// path calls them.
#[cfg(feature = "test-util")]
impl RecordStore {
    /// Overwrites the stored primary payload while keeping its tag,
    /// simulating an attacker with write access to the storage layer.
    pub fn corrupt_primary(&self, identity: &str, payload: &str) {
        if let Some(slot) = self.cache.get(identity) {
            if let Some(primary) = &slot.primary {
                let tampered = RecordSlot {
                    primary: Some(PrimaryRecord { payload: payload.to_owned(), tag: primary.tag }),
                    backup: slot.backup.clone(),
                };
                self.cache.insert(identity.to_owned(), Arc::new(tampered));
            }
        }
    }

    /// Removes the backup half of the slot, simulating an expired or
    /// destroyed backup copy.
    pub fn drop_backup(&self, identity: &str) {
        if let Some(slot) = self.cache.get(identity) {
            let gutted = RecordSlot { primary: slot.primary.clone(), backup: None };
            self.cache.insert(identity.to_owned(), Arc::new(gutted));
        }
    }
}

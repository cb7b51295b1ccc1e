//! Per-identity session secrets with sliding expiry.

use crate::error::StoreError;
use moka::Expiry;
use moka::sync::Cache;
use sanctum_kernel::safe_identity;
use sanctum_vault::SharedSecret;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// A freshly issued identity and its shared secret.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub identity: String,
    pub secret: Arc<SharedSecret>,
}

/// Sliding expiry: every successful read restarts the TTL clock, so an
/// active session stays alive indefinitely while an abandoned one decays.
struct SlidingExpiry {
    ttl: Duration,
}

impl Expiry<String, Arc<SharedSecret>> for SlidingExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        _value: &Arc<SharedSecret>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl)
    }

    fn expire_after_read(
        &self,
        _key: &String,
        _value: &Arc<SharedSecret>,
        _read_at: Instant,
        _duration_until_expiry: Option<Duration>,
        _last_modified_at: Instant,
    ) -> Option<Duration> {
        Some(self.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        _value: &Arc<SharedSecret>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.ttl)
    }
}

/// The session store: exactly one live [`SharedSecret`] per identity.
///
/// Internally reference-counted; clone freely into handlers.
///
/// Secrets never appear in logs or error output; only identities do.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<String, Arc<SharedSecret>>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("ttl", &self.ttl)
            .field("live_sessions", &self.cache.entry_count())
            .finish()
    }
}

impl SessionStore {
    /// Creates a store whose entries live `ttl` past their last read.
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .expire_after(SlidingExpiry { ttl })
            .build();
        Self { cache, ttl }
    }

    /// Generates a fresh identity and secret, binds them, and returns
    /// both. Regenerating a session invalidates everything derived from
    /// the previous secret by construction: the old identity is simply
    /// never handed out again.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] if secret generation fails.
    pub fn establish(&self) -> Result<EstablishedSession, StoreError> {
        let identity = safe_identity!();
        let secret = Arc::new(SharedSecret::generate().map_err(|e| StoreError::Unavailable {
            message: e.to_string().into(),
            context: Some("session secret generation".into()),
        })?);

        self.cache.insert(identity.clone(), Arc::clone(&secret));
        debug!(identity, "Session established");

        Ok(EstablishedSession { identity, secret })
    }

    /// Looks up the live secret for an identity, refreshing its TTL.
    ///
    /// `Ok(None)` means absent or expired — the caller must have the
    /// client re-establish; it is not a failure.
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn lookup(&self, identity: &str) -> Result<Option<Arc<SharedSecret>>, StoreError> {
        Ok(self.cache.get(identity))
    }

    /// Deletes a session ahead of its natural expiry (explicit clear).
    ///
    /// # Errors
    /// Returns [`StoreError::Unavailable`] on infrastructure failure.
    pub fn invalidate(&self, identity: &str) -> Result<(), StoreError> {
        self.cache.invalidate(identity);
        debug!(identity, "Session invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_establish_issues_distinct_sessions() {
        let store = SessionStore::new(Duration::from_secs(60), 100);
        let a = store.establish().unwrap();
        let b = store.establish().unwrap();

        assert_ne!(a.identity, b.identity);
        assert_eq!(a.identity.len(), 24);
    }

    #[test]
    fn test_lookup_returns_the_bound_secret() {
        let store = SessionStore::new(Duration::from_secs(60), 100);
        let session = store.establish().unwrap();

        let found = store.lookup(&session.identity).unwrap().expect("session must be live");
        assert_eq!(found.to_hex(), session.secret.to_hex());
    }

    #[test]
    fn test_invalidate_removes_the_session() {
        let store = SessionStore::new(Duration::from_secs(60), 100);
        let session = store.establish().unwrap();

        store.invalidate(&session.identity).unwrap();
        assert!(store.lookup(&session.identity).unwrap().is_none());
    }

    #[test]
    fn test_unknown_identity_is_not_an_error() {
        let store = SessionStore::new(Duration::from_secs(60), 100);
        assert!(store.lookup("never-established").unwrap().is_none());
    }
}

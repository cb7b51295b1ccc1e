//! TTL'd session and record stores.
//!
//! Two independent stores back the protected-data protocol:
//!
//! * [`SessionStore`] — one live [`SharedSecret`](sanctum_vault::SharedSecret)
//!   per identity, with *sliding* expiry: every successful lookup refreshes
//!   the TTL, so active sessions persist and abandoned ones decay.
//! * [`RecordStore`] — one primary/backup record pair per identity, with a
//!   fixed TTL counted from the last write. The pair is stored as a single
//!   slot value, which is what makes the save operation atomic with
//!   respect to concurrent readers.
//!
//! Absence (expired or never written) is `Ok(None)` everywhere — it is a
//! protocol signal, not a failure. Infrastructure failures surface as
//! [`StoreError::Unavailable`] and are never swallowed.
//!
//! Concurrent saves under one identity are last-write-wins: an identity
//! models one logical session with a single writer in practice.

mod error;
mod records;
mod session;

pub use error::{StoreError, StoreErrorExt};
pub use records::{PrimaryRecord, RecordStore};
pub use session::{EstablishedSession, SessionStore};

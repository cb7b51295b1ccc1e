//! Custody feature slice: tamper-evident save/retrieve with self-healing
//! records and session-bound transit protection.
//!
//! The slice owns the server half of the protocol end to end: session
//! lifecycle, the dual-tag save path, the tamper-detecting read path, and
//! the bearer-credential seam that turns requests into stable identities.

mod api;
mod auth;
mod error;
mod service;

pub use api::{Caller, CustodyState, router};
pub use auth::CredentialAuthority;
pub use error::{CustodyError, CustodyErrorExt};
pub use service::Custody;

use crate::error::CustodyErrorExt as _;
use sanctum_kernel::config::AppConfig;
use sanctum_store::{RecordStore, SessionStore};
use sanctum_vault::Vault;
use std::time::Duration;

/// Initializes the custody slice from configuration: stores, the at-rest
/// vault, and the credential authority.
///
/// # Errors
/// Returns [`CustodyError`] if the process secrets cannot be generated.
pub fn init(cfg: &AppConfig) -> Result<CustodyState, CustodyError> {
    let sessions = SessionStore::new(
        Duration::from_secs(cfg.custody.session_ttl_seconds),
        cfg.custody.session_cache_capacity,
    );
    let records = RecordStore::new(
        Duration::from_secs(cfg.custody.record_ttl_seconds),
        cfg.custody.record_cache_capacity,
    );
    let vault = Vault::generate().map_err(|e| CustodyError::Internal {
        message: e.to_string().into(),
        context: Some("server secret generation".into()),
    })?;
    let credentials = CredentialAuthority::init(
        cfg.security.credential.issuer.clone(),
        Duration::from_secs(cfg.security.credential.ttl_seconds),
    )
    .context("custody bootstrap")?;

    tracing::info!("Custody slice initialized");

    Ok(CustodyState { custody: Custody::new(sessions, records, vault), credentials })
}

//! Ergonomic re-exports for downstream crates.

pub use crate::config::{AppConfig, ConfigError, ConfigErrorExt, load_config};
pub use crate::protocol::{BackupRestoreRequest, Envelope, ErrorBody, SessionGrant};
pub use crate::safe_identity;
#[cfg(feature = "server")]
pub use crate::server::system_router;

//! System-level HTTP surface shared by all applications.

mod health;
mod router;

pub use router::system_router;

//! The transport seam between the client protocol and the wire.
//!
//! The protocol logic never speaks HTTP directly; it drives a
//! [`Transport`], which the application implements over its HTTP stack.
//! Tests drive an in-process loopback implementation instead.

use async_trait::async_trait;
use sanctum_kernel::protocol::{Envelope, SessionGrant};
use std::borrow::Cow;

/// Transport-level failure, split the only way the protocol cares about:
/// could not reach the server vs. the server said no.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connectivity failure{}: {message}", format_context(.context))]
    Connectivity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The server answered with a machine-checkable error code.
    #[error("Rejected ({code}): {message}")]
    Rejected { code: String, message: String },
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

/// Wire operations the client protocol needs.
///
/// Implementations must be cheap to call concurrently; the protocol
/// serializes its own operations, not the transport's.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Calls the session-establishment endpoint.
    async fn establish(&self) -> Result<SessionGrant, TransportError>;

    /// Sends a tagged envelope for storage.
    async fn save(&self, credential: &str, envelope: Envelope) -> Result<(), TransportError>;

    /// Fetches the stored envelope.
    async fn retrieve(&self, credential: &str) -> Result<Envelope, TransportError>;

    /// Destroys the server-side session.
    async fn clear(&self, credential: &str) -> Result<(), TransportError>;
}

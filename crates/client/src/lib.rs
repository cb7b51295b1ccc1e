//! Client half of the protected-data protocol.
//!
//! The client owns the session state machine (`Unbound → Bound →
//! Unbound`), performs the session-keyed envelope crypto locally, and
//! re-establishes transparently whenever the session goes missing —
//! callers get a distinct, recoverable [`ClientError::SessionNotReady`]
//! instead of a hard failure, and the handshake runs as a cancellable
//! background task.
//!
//! The wire itself is abstracted behind [`Transport`]; the protocol never
//! sees HTTP.
//!
//! ## Example
//!
//! ```rust,ignore
//! let client = Client::new(HttpTransport::new(base_url));
//! client.establish_session().await?;
//!
//! client.save("hello").await?;
//! assert_eq!(client.retrieve().await?, "hello");
//! ```

mod backoff;
mod client;
mod error;
mod transport;

pub use backoff::RetryPolicy;
pub use client::Client;
pub use error::{ClientError, ClientErrorExt};
pub use transport::{Transport, TransportError};

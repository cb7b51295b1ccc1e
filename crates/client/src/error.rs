use crate::transport::TransportError;
use sanctum_vault::VaultError;
use std::borrow::Cow;

/// A specialized [`ClientError`] enum of this crate.
///
/// Wire-integrity kinds are deliberately separate from session kinds:
/// [`ClientError::SessionNotReady`] means "retry after establishment",
/// while [`ClientError::IntegrityCompromisedInTransit`] means "someone
/// touched the response" — very different remedies.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No bound session yet; establishment has been triggered in the
    /// background. Recoverable — retry once it completes.
    #[error("Session not ready{}: {message}", format_context(.context))]
    SessionNotReady { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A response envelope failed the transit tag check. The payload was
    /// discarded without decryption and no client state changed.
    #[error("Response integrity compromised in transit{}: {message}", format_context(.context))]
    IntegrityCompromisedInTransit {
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    /// Establishment retries were exhausted without reaching the server.
    #[error("Connectivity failure{}: {message}", format_context(.context))]
    Connectivity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The server answered with an error this client cannot repair by
    /// re-establishing (e.g. `data_missing`, `data_tampered_no_backup`).
    #[error("Server rejected the request ({code}){}: {message}", format_context(.context))]
    Rejected { code: String, message: String, context: Option<Cow<'static, str>> },

    /// A response that could not even be decoded for verification.
    #[error("Malformed response{}: {message}", format_context(.context))]
    MalformedResponse { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Local cryptographic failure (should not occur after a verified
    /// tag; a defect if seen).
    #[error("Client crypto failure{}: {source}", format_context(.context))]
    Crypto { source: VaultError, context: Option<Cow<'static, str>> },
}

impl From<VaultError> for ClientError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::TransitTagMismatch { message, context } => {
                Self::IntegrityCompromisedInTransit { message, context }
            },
            VaultError::InvalidTag { .. } | VaultError::InvalidSecret { .. } => {
                Self::MalformedResponse { message: err.to_string().into(), context: None }
            },
            other => Self::Crypto { source: other, context: None },
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connectivity { message, context } => {
                Self::Connectivity { message, context }
            },
            TransportError::Rejected { code, message } => {
                Self::Rejected { code, message, context: None }
            },
        }
    }
}

/// Attaches context to a `Result<T, ClientError>`.
pub trait ClientErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, ClientError>;
}

impl<T> ClientErrorExt<T> for Result<T, ClientError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                ClientError::SessionNotReady { context: c, .. }
                | ClientError::IntegrityCompromisedInTransit { context: c, .. }
                | ClientError::Connectivity { context: c, .. }
                | ClientError::Rejected { context: c, .. }
                | ClientError::MalformedResponse { context: c, .. }
                | ClientError::Crypto { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

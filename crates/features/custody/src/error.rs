use sanctum_store::StoreError;
use sanctum_vault::VaultError;
use std::borrow::Cow;

/// A specialized [`CustodyError`] enum of this crate.
///
/// Session/credential kinds, data-integrity kinds, and infrastructure
/// kinds are kept distinct so a caller can always choose the correct
/// remedy: re-authenticate, re-save, or retry later.
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// No live session for this identity; the caller must re-establish.
    #[error("Session expired{}: {message}", format_context(.context))]
    SessionExpired { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The presented credential is missing, malformed, or not ours.
    #[error("Credential rejected{}: {message}", format_context(.context))]
    CredentialInvalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// No record stored for this identity; recoverable by saving.
    #[error("No data stored{}: {message}", format_context(.context))]
    DataMissing { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A request envelope failed the transit tag check.
    #[error("Transit tag mismatch{}: {message}", format_context(.context))]
    TransitTagMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The request envelope could not be decoded at all.
    #[error("Malformed envelope{}: {message}", format_context(.context))]
    MalformedEnvelope { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// At-rest tampering detected and no backup exists. Terminal for
    /// this identity's data.
    #[error("Data tampered and no backup available{}: {message}", format_context(.context))]
    DataTamperedNoBackup { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Ciphertext with a valid transit tag failed to decrypt. The tag
    /// check precedes decryption, so reaching this is a client defect.
    #[error("Decryption failure{}: {message}", format_context(.context))]
    Decryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Infrastructure failure in a backing store; retryable.
    #[error("Store unavailable{}: {source}", format_context(.context))]
    StoreUnavailable { source: StoreError, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal custody error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl CustodyError {
    /// Stable machine-checkable error code for the wire.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SessionExpired { .. } => "session_expired",
            Self::CredentialInvalid { .. } => "credential_invalid",
            Self::DataMissing { .. } => "data_missing",
            Self::TransitTagMismatch { .. } => "transit_tag_mismatch",
            Self::MalformedEnvelope { .. } => "malformed_envelope",
            Self::DataTamperedNoBackup { .. } => "data_tampered_no_backup",
            Self::Decryption { .. } => "decryption_error",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<StoreError> for CustodyError {
    fn from(source: StoreError) -> Self {
        Self::StoreUnavailable { source, context: None }
    }
}

impl From<VaultError> for CustodyError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::TransitTagMismatch { message, context } => {
                Self::TransitTagMismatch { message, context }
            },
            VaultError::Decryption { message, context } => Self::Decryption { message, context },
            VaultError::InvalidTag { message, context }
            | VaultError::InvalidSecret { message, context } => {
                Self::MalformedEnvelope { message, context }
            },
            other => Self::Internal { message: other.to_string().into(), context: None },
        }
    }
}

/// Attaches context to a `Result<T, CustodyError>`.
pub trait CustodyErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, CustodyError>;
}

impl<T> CustodyErrorExt<T> for Result<T, CustodyError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                CustodyError::SessionExpired { context: c, .. }
                | CustodyError::CredentialInvalid { context: c, .. }
                | CustodyError::DataMissing { context: c, .. }
                | CustodyError::TransitTagMismatch { context: c, .. }
                | CustodyError::MalformedEnvelope { context: c, .. }
                | CustodyError::DataTamperedNoBackup { context: c, .. }
                | CustodyError::Decryption { context: c, .. }
                | CustodyError::StoreUnavailable { context: c, .. }
                | CustodyError::Internal { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

use std::borrow::Cow;

/// A specialized [`VaultError`] enum of this crate.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Identity unsuitable as IV material{}: {message}", format_context(.context))]
    InvalidIdentity { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Malformed secret{}: {message}", format_context(.context))]
    InvalidSecret { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Malformed authentication tag{}: {message}", format_context(.context))]
    InvalidTag { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Decryption failure{}: {message}", format_context(.context))]
    Decryption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Transit tag verification failed{}: {message}", format_context(.context))]
    TransitTagMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("At-rest tag verification failed{}: {message}", format_context(.context))]
    AtRestTagMismatch { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Random source failure{}: {message}", format_context(.context))]
    RandomSource { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Attaches context to a `Result<T, VaultError>` without losing the variant.
pub trait VaultErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, VaultError>;
}

impl<T> VaultErrorExt<T> for Result<T, VaultError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                VaultError::InvalidIdentity { context: c, .. }
                | VaultError::InvalidSecret { context: c, .. }
                | VaultError::InvalidTag { context: c, .. }
                | VaultError::Decryption { context: c, .. }
                | VaultError::TransitTagMismatch { context: c, .. }
                | VaultError::AtRestTagMismatch { context: c, .. }
                | VaultError::RandomSource { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

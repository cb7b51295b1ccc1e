use std::borrow::Cow;

/// A specialized [`StoreError`] enum of this crate.
///
/// A missing or expired entry is never an error; absence is reported as
/// `Ok(None)` by the store operations, because it is a protocol signal
/// (re-establish, re-save) rather than a failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable{}: {message}", format_context(.context))]
    Unavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Attaches context to a `Result<T, StoreError>`.
pub trait StoreErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StoreError>;
}

impl<T> StoreErrorExt<T> for Result<T, StoreError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                StoreError::Unavailable { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

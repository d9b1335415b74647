use super::{resolve::ResolveErrorKind, select::SelectErrorKind};

/// Cause of a failed [`crate::Registration::create`] call.
#[derive(thiserror::Error, Debug)]
pub enum InstantiatorErrorKind {
    #[error(transparent)]
    Deps(Box<ResolveErrorKind>),
    #[error(transparent)]
    Select(SelectErrorKind),
    #[error(transparent)]
    Factory(anyhow::Error),
}

impl From<anyhow::Error> for InstantiatorErrorKind {
    /// Nested resolve errors raised with `?` inside a factory are recovered as dependency errors.
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ResolveErrorKind>() {
            Ok(err) => Self::Deps(Box::new(err)),
            Err(err) => Self::Factory(err),
        }
    }
}

impl From<ResolveErrorKind> for InstantiatorErrorKind {
    fn from(err: ResolveErrorKind) -> Self {
        Self::Deps(Box::new(err))
    }
}

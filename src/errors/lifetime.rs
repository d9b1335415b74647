use crate::{lifetime::Lifetime, scope::ScopeKey};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LifetimeErrorKind {
    #[error("Instance of `{service}` is already tracked by the {lifetime} lifetime manager (scope: {scope:?})")]
    AlreadyTracked {
        service: &'static str,
        lifetime: Lifetime,
        scope: Option<ScopeKey>,
    },
    #[error("The {lifetime} lifetime manager is disposed")]
    Disposed { lifetime: Lifetime },
}

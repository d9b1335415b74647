use crate::lifetime::Lifetime;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationErrorKind {
    #[error("Invalid registration: {reason}")]
    InvalidArgument { reason: String },
    #[error("Service `{service}` is already registered")]
    AlreadyRegistered { service: &'static str },
    #[error("Registry is read-only")]
    ReadOnly,
    #[error("Lifetime mismatch for `{service}`. Actual: {actual}, expected: {expected}")]
    LifetimeMismatch {
        service: &'static str,
        expected: Lifetime,
        actual: Lifetime,
    },
    #[error("Multi-registration of `{service}` can't be empty")]
    EmptyMulti { service: &'static str },
    #[error("Lifetime of `{service}` can't be changed after an instance was created")]
    LifetimeFrozen { service: &'static str },
    #[error("Lifetime of `{service}` is managed by its multi-registration")]
    LifetimeGrouped { service: &'static str },
    #[error("Container is disposed")]
    Disposed,
}

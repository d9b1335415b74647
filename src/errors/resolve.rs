use super::{instantiator::InstantiatorErrorKind, lifetime::LifetimeErrorKind, select::SelectErrorKind};
use crate::lifetime::Lifetime;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Service `{service}` not registered")]
    NotFound { service: &'static str },
    #[error("Maximum resolve depth {max_depth} exceeded: {}", chain.join(" -> "))]
    DepthExceeded { max_depth: usize, chain: Vec<&'static str> },
    #[error(transparent)]
    Select(#[from] SelectErrorKind),
    #[error("Failed to resolve `{service}` ({})", chain.join(" -> "))]
    ResolveFailed {
        service: &'static str,
        chain: Vec<&'static str>,
        trace: Option<String>,
        #[source]
        source: InstantiatorErrorKind,
    },
    #[error("Container is disposed")]
    Disposed,
    #[error("No lifetime manager registered for the {lifetime} lifetime")]
    NoLifetimeManager { lifetime: Lifetime },
    #[error("Incorrect instance type. Actual: {actual}, expected: {expected}")]
    IncorrectType { expected: &'static str, actual: &'static str },
    #[error(transparent)]
    Lifetime(#[from] LifetimeErrorKind),
}

impl ResolveErrorKind {
    /// Walks nested [`ResolveErrorKind::ResolveFailed`] errors down to the failure that started the chain.
    /// Factory errors stop the walk at the innermost `ResolveFailed`.
    #[must_use]
    pub fn root_cause(&self) -> &ResolveErrorKind {
        let mut current = self;
        while let ResolveErrorKind::ResolveFailed {
            source: InstantiatorErrorKind::Deps(inner),
            ..
        } = current
        {
            current = inner.as_ref();
        }
        current
    }

    /// Errors that already describe the whole chain and are returned to the caller unchanged.
    #[inline]
    #[must_use]
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResolveErrorKind::ResolveFailed { .. } | ResolveErrorKind::DepthExceeded { .. } | ResolveErrorKind::Disposed
        )
    }

    #[inline]
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        match self {
            ResolveErrorKind::ResolveFailed { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}

use crate::{scope::ScopeKey, selector::ConstructionPolicy};

/// Config of a container
/// ## Fields
/// - `max_depth`:
///   Maximum nesting of dependency resolutions, the root resolution has depth 0.
///   Exceeding it fails with [`crate::ResolveErrorKind::DepthExceeded`], which is also how dependency cycles surface.
///   Must be at least 1.
/// - `construction_policy`:
///   Policy used to choose among the constructors of reflective registrations unless a resolution overrides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub max_depth: usize,
    pub construction_policy: ConstructionPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 10,
            construction_policy: ConstructionPolicy::Mixed,
        }
    }
}

/// What a top-level resolution of an unregistered service returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMode {
    /// Fail with [`crate::ResolveErrorKind::NotFound`]
    #[default]
    Throw,
    /// Return `None`. Missing dependencies of a registered service still fail.
    ReturnDefault,
}

/// Per-call overrides of [`crate::Container::resolve_with`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    pub scope: Option<ScopeKey>,
    pub policy: Option<ConstructionPolicy>,
    pub mode: ResolveMode,
}

impl ResolveOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn scope(mut self, scope: ScopeKey) -> Self {
        self.scope = Some(scope);
        self
    }

    #[inline]
    #[must_use]
    pub fn policy(mut self, policy: ConstructionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    #[inline]
    #[must_use]
    pub fn mode(mut self, mode: ResolveMode) -> Self {
        self.mode = mode;
        self
    }
}

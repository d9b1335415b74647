use core::{
    fmt::{self, Display, Formatter},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    config::{ResolveMode, ResolveOptions},
    container::Container,
    errors::{DisposeErrorKind, ResolveErrorKind},
};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Key of a resolution scope. Scoped instances are cached per key, resolutions without a key use the global scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeKey(u64);

impl ScopeKey {
    /// Creates a key that is unique within the process
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl Default for ScopeKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ScopeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Handle of a scope created with [`Container::create_scope`].
///
/// Scoped instances resolved through it are disposed with [`Self::dispose`] or when the handle is dropped.
pub struct Scope {
    container: Container,
    key: ScopeKey,
    disposed: AtomicBool,
}

impl Scope {
    #[inline]
    #[must_use]
    pub(crate) fn new(container: Container) -> Self {
        Self {
            container,
            key: ScopeKey::new(),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> ScopeKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Resolves a service in this scope
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::Disposed`] once the scope is disposed
    /// - Returns the errors of [`Container::resolve`]
    #[inline]
    pub fn resolve<S>(&self) -> Result<Arc<S>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.container.resolve_scoped(self.key)
    }

    /// # Errors
    /// See [`Self::resolve`]
    #[inline]
    pub fn try_resolve<S>(&self) -> Result<Option<Arc<S>>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.container
            .resolve_with(ResolveOptions::new().scope(self.key).mode(ResolveMode::ReturnDefault))
    }

    fn ensure_open(&self) -> Result<(), ResolveErrorKind> {
        if self.is_disposed() {
            let err = ResolveErrorKind::Disposed;
            error!(scope = %self.key, "{}", err);
            return Err(err);
        }
        Ok(())
    }

    /// Disposes the instances cached for this scope. Calling it again does nothing.
    /// The handle can't resolve afterwards, resolving with its key through [`Container::resolve_scoped`] starts a fresh scope.
    ///
    /// # Errors
    /// Returns every failed disposal, the rest are disposed anyway
    pub fn dispose(&self) -> Result<(), DisposeErrorKind> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.container.dispose_scope(self.key)
    }

    /// # Errors
    /// Returns every failed disposal, the rest are disposed anyway
    pub async fn dispose_async(&self) -> Result<(), DisposeErrorKind> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.container.dispose_scope_async(self.key).await
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            error!(scope = %self.key, "{}", err);
        }
        debug!(scope = %self.key, "Scope closed on drop");
    }
}

#[cfg(test)]
mod tests {
    use super::ScopeKey;
    use crate::{direct, errors::ResolveErrorKind, Container};

    use std::sync::Arc;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Session;

    #[test]
    #[traced_test]
    fn test_disposed_scope_refuses_resolve() {
        let container = Container::new();
        container.register(direct::<Session>().scoped()).unwrap();

        let scope = container.create_scope();
        let session = scope.resolve::<Session>().unwrap();
        assert!(Arc::ptr_eq(&session, &scope.resolve::<Session>().unwrap()));

        scope.dispose().unwrap();

        assert!(scope.is_disposed());
        assert!(matches!(scope.resolve::<Session>(), Err(ResolveErrorKind::Disposed)));
        assert!(matches!(scope.try_resolve::<Session>(), Err(ResolveErrorKind::Disposed)));
        assert!(container.resolve::<Session>().is_ok());
    }

    #[test]
    fn test_keys_unique() {
        let (key_1, key_2) = (ScopeKey::new(), ScopeKey::new());

        assert_ne!(key_1, key_2);
        assert_eq!(ScopeKey::from_raw(key_1.as_raw()), key_1);
        assert_eq!(ScopeKey::from_raw(7).to_string(), "scope#7");
    }
}

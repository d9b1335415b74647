mod scoped;
mod singleton;
mod transient;

pub use scoped::ScopedLifetimeManager;
pub use singleton::SingletonLifetimeManager;
pub use transient::TransientLifetimeManager;

use futures::future::BoxFuture;
use parking_lot::ReentrantMutex;
use std::sync::Arc;
use tracing::error;

use crate::{
    any::AnyInstance,
    context::ResolveContext,
    disposal::{self, Disposer},
    errors::{DisposeErrorKind, LifetimeErrorKind},
    lifetime::Lifetime,
    registration::Created,
    scope::ScopeKey,
};

/// Disposes an instance the manager refused and returns the refusal
fn refuse(created: Created, err: LifetimeErrorKind) -> LifetimeErrorKind {
    if let Err(dispose_err) = created.dispose() {
        error!("{}", dispose_err);
    }
    err
}

/// Caching policy of one lifetime tag, and owner of every instance it tracks.
///
/// The container calls [`Self::resolve`], [`Registration::create`](crate::Registration::create) and [`Self::track`]
/// while holding [`Self::key_lock`] of the requested key, so at most one instance is constructed per cache key.
pub trait LifetimeManager: Send + Sync + 'static {
    fn lifetime(&self) -> Lifetime;

    /// Construction lock of one cache key, spanning check, create and track.
    /// Re-entrant, so a dependency cycle on one thread runs into the depth limit instead of deadlocking.
    /// `None` if the manager doesn't cache.
    fn key_lock(&self, context: &ResolveContext<'_>, scope: Option<ScopeKey>) -> Option<Arc<ReentrantMutex<()>>>;

    /// Cached instance for the requested service, if any
    fn resolve(&self, context: &ResolveContext<'_>, scope: Option<ScopeKey>) -> Option<AnyInstance>;

    /// Takes ownership of a freshly created instance.
    /// A refused instance must be disposed with [`Created::dispose`], nothing else owns it.
    ///
    /// # Errors
    /// - Returns [`LifetimeErrorKind::AlreadyTracked`] if an instance is already cached for the key
    /// - Returns [`LifetimeErrorKind::Disposed`] if the manager was drained
    fn track(&self, context: &ResolveContext<'_>, created: Created, scope: Option<ScopeKey>) -> Result<(), LifetimeErrorKind>;

    /// Forgets the instances of one scope, returning their disposers in tracking order
    #[inline]
    fn dispose_scope(&self, _scope: ScopeKey) -> Vec<Disposer> {
        Vec::new()
    }

    /// Marks the manager disposed, clears the cache and returns every tracked disposer in tracking order.
    /// A second call returns nothing.
    fn drain(&self) -> Vec<Disposer>;

    /// # Errors
    /// Returns every failed disposal, the rest are disposed anyway
    fn dispose_all(&self) -> Result<(), DisposeErrorKind> {
        disposal::dispose_all(self.drain())
    }

    fn dispose_all_async(&self) -> BoxFuture<'_, Result<(), DisposeErrorKind>> {
        let disposers = self.drain();
        Box::pin(disposal::dispose_all_async(disposers))
    }
}

/// Managers of a container, ordered transient, scoped, singleton, then custom tags in registration order
#[derive(Clone)]
pub(crate) struct LifetimeManagers(Vec<Arc<dyn LifetimeManager>>);

impl Default for LifetimeManagers {
    fn default() -> Self {
        Self(vec![
            Arc::new(TransientLifetimeManager::new()),
            Arc::new(ScopedLifetimeManager::new()),
            Arc::new(SingletonLifetimeManager::new()),
        ])
    }
}

impl LifetimeManagers {
    /// Adds or replaces the manager of its lifetime, a replaced manager keeps its position
    pub(crate) fn insert(&mut self, manager: Arc<dyn LifetimeManager>) {
        match self.0.iter_mut().find(|existing| existing.lifetime() == manager.lifetime()) {
            Some(existing) => *existing = manager,
            None => self.0.push(manager),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, lifetime: Lifetime) -> Option<&Arc<dyn LifetimeManager>> {
        self.0.iter().find(|manager| manager.lifetime() == lifetime)
    }

    #[inline]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn LifetimeManager>> {
        self.0.iter()
    }
}

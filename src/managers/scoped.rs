use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tracing::debug;

use super::{refuse, LifetimeManager};
use crate::{
    any::{AnyInstance, ServiceId},
    cache::Cache,
    context::ResolveContext,
    disposal::Disposer,
    errors::LifetimeErrorKind,
    lifetime::Lifetime,
    registration::Created,
    scope::ScopeKey,
};

/// One instance per service and scope key. The absent key is the global scope, distinct from every keyed scope.
pub struct ScopedLifetimeManager {
    cache: Mutex<Cache<(ServiceId, Option<ScopeKey>)>>,
}

impl ScopedLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(Cache::new()),
        }
    }
}

impl Default for ScopedLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for ScopedLifetimeManager {
    #[inline]
    fn lifetime(&self) -> Lifetime {
        Lifetime::Scoped
    }

    #[inline]
    fn key_lock(&self, context: &ResolveContext<'_>, scope: Option<ScopeKey>) -> Option<Arc<ReentrantMutex<()>>> {
        Some(self.cache.lock().lock_for(&(context.service(), scope)))
    }

    #[inline]
    fn resolve(&self, context: &ResolveContext<'_>, scope: Option<ScopeKey>) -> Option<AnyInstance> {
        self.cache.lock().get(&(context.service(), scope))
    }

    fn track(&self, context: &ResolveContext<'_>, created: Created, scope: Option<ScopeKey>) -> Result<(), LifetimeErrorKind> {
        let key = (context.service(), scope);

        let mut cache = self.cache.lock();
        if cache.disposed {
            drop(cache);
            return Err(refuse(created, LifetimeErrorKind::Disposed { lifetime: Lifetime::Scoped }));
        }
        if cache.contains(&key) {
            drop(cache);
            return Err(refuse(
                created,
                LifetimeErrorKind::AlreadyTracked {
                    service: key.0.name,
                    lifetime: Lifetime::Scoped,
                    scope,
                },
            ));
        }

        let (instance, disposers) = created.into_parts();
        cache.insert(key, instance, disposers);
        debug!(?scope, "Cached");
        Ok(())
    }

    fn dispose_scope(&self, scope: ScopeKey) -> Vec<Disposer> {
        let disposers = self.cache.lock().take_matching(|(_, key)| *key == Some(scope));

        debug!(%scope, disposers = disposers.len(), "Scope drained");
        disposers
    }

    fn drain(&self) -> Vec<Disposer> {
        self.cache.lock().drain()
    }
}

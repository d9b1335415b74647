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

/// One instance per service for the whole container, the scope key is ignored
pub struct SingletonLifetimeManager {
    cache: Mutex<Cache<ServiceId>>,
}

impl SingletonLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(Cache::new()),
        }
    }
}

impl Default for SingletonLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for SingletonLifetimeManager {
    #[inline]
    fn lifetime(&self) -> Lifetime {
        Lifetime::Singleton
    }

    #[inline]
    fn key_lock(&self, context: &ResolveContext<'_>, _scope: Option<ScopeKey>) -> Option<Arc<ReentrantMutex<()>>> {
        Some(self.cache.lock().lock_for(&context.service()))
    }

    #[inline]
    fn resolve(&self, context: &ResolveContext<'_>, _scope: Option<ScopeKey>) -> Option<AnyInstance> {
        self.cache.lock().get(&context.service())
    }

    fn track(&self, context: &ResolveContext<'_>, created: Created, scope: Option<ScopeKey>) -> Result<(), LifetimeErrorKind> {
        let service = context.service();

        let mut cache = self.cache.lock();
        if cache.disposed {
            drop(cache);
            return Err(refuse(created, LifetimeErrorKind::Disposed { lifetime: Lifetime::Singleton }));
        }
        if cache.contains(&service) {
            drop(cache);
            return Err(refuse(
                created,
                LifetimeErrorKind::AlreadyTracked {
                    service: service.name,
                    lifetime: Lifetime::Singleton,
                    scope,
                },
            ));
        }

        let (instance, disposers) = created.into_parts();
        cache.insert(service, instance, disposers);
        debug!("Cached");
        Ok(())
    }

    fn drain(&self) -> Vec<Disposer> {
        self.cache.lock().drain()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        any::ServiceId, context::ResolveContext, direct, errors::LifetimeErrorKind, managers::LifetimeManager, scope::ScopeKey,
        Config, Container, Created,
    };

    use super::SingletonLifetimeManager;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Pool;

    #[test]
    #[traced_test]
    fn test_singleton_ignores_scope() {
        let container = Container::new();
        container.register(direct::<Pool>().singleton()).unwrap();

        let global = container.resolve::<Pool>().unwrap();
        let keyed = container.resolve_scoped::<Pool>(ScopeKey::new()).unwrap();

        assert!(Arc::ptr_eq(&global, &keyed));
    }

    #[test]
    fn test_track_twice_and_after_drain() {
        let container = Container::new();
        let manager = SingletonLifetimeManager::new();
        let context = ResolveContext::root(&container, ServiceId::of::<Pool>(), None, Config::default().construction_policy, None);

        manager
            .track(&context, Created::new(crate::any::erase(Arc::new(Pool)), vec![]), None)
            .unwrap();
        assert!(manager.resolve(&context, None).is_some());
        assert!(matches!(
            manager.track(&context, Created::new(crate::any::erase(Arc::new(Pool)), vec![]), None),
            Err(LifetimeErrorKind::AlreadyTracked { .. })
        ));

        assert!(manager.drain().is_empty());
        assert!(manager.resolve(&context, None).is_none());
        assert!(matches!(
            manager.track(&context, Created::new(crate::any::erase(Arc::new(Pool)), vec![]), None),
            Err(LifetimeErrorKind::Disposed { .. })
        ));
    }
}

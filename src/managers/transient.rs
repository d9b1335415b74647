use parking_lot::{Mutex, ReentrantMutex};
use std::sync::Arc;
use tracing::debug;

use super::{refuse, LifetimeManager};
use crate::{
    any::AnyInstance,
    cache::TrackedSet,
    context::ResolveContext,
    disposal::Disposer,
    errors::LifetimeErrorKind,
    lifetime::Lifetime,
    registration::Created,
    scope::ScopeKey,
};

struct Tracked {
    set: TrackedSet<()>,
    disposed: bool,
}

/// Never caches. Instances carrying disposal hooks are tracked until the container is disposed.
pub struct TransientLifetimeManager {
    tracked: Mutex<Tracked>,
}

impl TransientLifetimeManager {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(Tracked {
                set: TrackedSet::new(),
                disposed: false,
            }),
        }
    }
}

impl Default for TransientLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LifetimeManager for TransientLifetimeManager {
    #[inline]
    fn lifetime(&self) -> Lifetime {
        Lifetime::Transient
    }

    #[inline]
    fn key_lock(&self, _context: &ResolveContext<'_>, _scope: Option<ScopeKey>) -> Option<Arc<ReentrantMutex<()>>> {
        None
    }

    #[inline]
    fn resolve(&self, _context: &ResolveContext<'_>, _scope: Option<ScopeKey>) -> Option<AnyInstance> {
        None
    }

    fn track(&self, _context: &ResolveContext<'_>, created: Created, _scope: Option<ScopeKey>) -> Result<(), LifetimeErrorKind> {
        if !created.is_disposable() {
            return Ok(());
        }

        let mut tracked = self.tracked.lock();
        if tracked.disposed {
            drop(tracked);
            return Err(refuse(created, LifetimeErrorKind::Disposed { lifetime: Lifetime::Transient }));
        }
        for disposer in created.disposers {
            tracked.set.push((), disposer);
        }
        debug!(tracked = tracked.set.len(), "Tracked for disposal");
        Ok(())
    }

    fn drain(&self) -> Vec<Disposer> {
        let mut tracked = self.tracked.lock();
        tracked.disposed = true;
        tracked.set.take_all()
    }
}

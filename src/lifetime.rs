use core::{
    fmt::{self, Display, Formatter},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};
use parking_lot::Mutex;

use crate::errors::RegistrationErrorKind;

/// Lifetime tag of a registration, governs caching granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifetime {
    /// New instance per resolution, never cached
    Transient,
    /// One instance per scope key, the absent key is the global scope
    Scoped,
    /// One instance per container
    Singleton,
    /// Handled by a lifetime manager registered with [`crate::ContainerBuilder::lifetime_manager`]
    Custom(&'static str),
}

impl Lifetime {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Lifetime::Transient => "transient",
            Lifetime::Scoped => "scoped",
            Lifetime::Singleton => "singleton",
            Lifetime::Custom(name) => name,
        }
    }
}

impl Display for Lifetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifetime storage of a registration.
/// The tag can be changed until the first instance is created.
/// While the registration belongs to a group, only the group changes it.
pub(crate) struct LifetimeSlot {
    lifetime: Mutex<Lifetime>,
    frozen: AtomicBool,
    groups: AtomicUsize,
}

impl LifetimeSlot {
    #[inline]
    #[must_use]
    pub(crate) fn new(lifetime: Lifetime) -> Self {
        Self {
            lifetime: Mutex::new(lifetime),
            frozen: AtomicBool::new(false),
            groups: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self) -> Lifetime {
        *self.lifetime.lock()
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, service: &'static str, lifetime: Lifetime) -> Result<(), RegistrationErrorKind> {
        let mut guard = self.lifetime.lock();
        if self.groups.load(Ordering::Acquire) > 0 {
            return Err(RegistrationErrorKind::LifetimeGrouped { service });
        }
        if self.is_frozen() {
            return Err(RegistrationErrorKind::LifetimeFrozen { service });
        }
        *guard = lifetime;
        Ok(())
    }

    /// Same as [`Self::set`] for the group owning the slot
    pub(crate) fn set_grouped(&self, service: &'static str, lifetime: Lifetime) -> Result<(), RegistrationErrorKind> {
        let mut guard = self.lifetime.lock();
        if self.is_frozen() {
            return Err(RegistrationErrorKind::LifetimeFrozen { service });
        }
        *guard = lifetime;
        Ok(())
    }

    #[inline]
    pub(crate) fn join(&self) {
        let _guard = self.lifetime.lock();
        self.groups.fetch_add(1, Ordering::AcqRel);
    }

    #[inline]
    pub(crate) fn leave(&self) {
        let _guard = self.lifetime.lock();
        let _ = self
            .groups
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |groups| groups.checked_sub(1));
    }

    #[inline]
    pub(crate) fn freeze(&self) {
        let _guard = self.lifetime.lock();
        self.frozen.store(true, Ordering::Release);
    }
}

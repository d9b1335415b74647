use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, error};

use crate::{
    any::ServiceId,
    errors::RegistrationErrorKind,
    registration::{MultiRegistration, Registration},
};

/// Behaviour of [`Registry::register`] when the identifier is already bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegisterMode {
    /// Fail with [`RegistrationErrorKind::AlreadyRegistered`]
    #[default]
    Throw,
    /// Overwrite the binding, it keeps its position in [`Registry::snapshot`]
    Replace,
    /// Keep the existing binding and drop the new one
    Ignore,
    /// Combine the existing binding and the new one into a [`MultiRegistration`]
    Append,
}

#[derive(Default, Clone)]
struct Entries {
    map: BTreeMap<ServiceId, (u64, Arc<dyn Registration>)>,
    next: u64,
}

/// Mapping from service identifiers to registrations.
///
/// Reads and writes are serialized by one lock, snapshots are copies.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<Entries>,
    read_only: bool,
}

impl Clone for Registry {
    /// Copies the bindings, the registrations themselves are shared
    fn clone(&self) -> Self {
        Self {
            entries: Mutex::new(self.entries.lock().clone()),
            read_only: self.read_only,
        }
    }
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// - Returns [`RegistrationErrorKind::ReadOnly`] if the registry is read-only
    /// - Returns [`RegistrationErrorKind::InvalidArgument`] if the registration produces another service than `service`
    /// - Returns [`RegistrationErrorKind::AlreadyRegistered`] if `service` is bound and `mode` is [`RegisterMode::Throw`],
    ///   or it's [`RegisterMode::Append`] and the lifetimes differ
    pub fn register(
        &self,
        service: ServiceId,
        registration: Arc<dyn Registration>,
        mode: RegisterMode,
    ) -> Result<(), RegistrationErrorKind> {
        if self.read_only {
            let err = RegistrationErrorKind::ReadOnly;
            error!("{}", err);
            return Err(err);
        }
        if registration.service() != service {
            let err = RegistrationErrorKind::InvalidArgument {
                reason: format!("registration of `{}` can't be bound to `{}`", registration.service().name, service.name),
            };
            error!("{}", err);
            return Err(err);
        }

        let mut entries = self.entries.lock();
        let Some((seq, existing)) = entries.map.get(&service).cloned() else {
            let seq = entries.next;
            entries.next += 1;
            entries.map.insert(service, (seq, registration));

            debug!(service = service.name, "Registered");
            return Ok(());
        };

        match mode {
            RegisterMode::Throw => {
                let err = RegistrationErrorKind::AlreadyRegistered { service: service.name };
                error!("{}", err);
                Err(err)
            }
            RegisterMode::Replace => {
                entries.map.insert(service, (seq, registration));
                debug!(service = service.name, "Replaced");
                Ok(())
            }
            RegisterMode::Ignore => {
                debug!(service = service.name, "Already registered, ignored");
                Ok(())
            }
            RegisterMode::Append => {
                if existing.lifetime() != registration.lifetime() {
                    let err = RegistrationErrorKind::AlreadyRegistered { service: service.name };
                    error!(expected = %existing.lifetime(), actual = %registration.lifetime(), "{}", err);
                    return Err(err);
                }

                let multi = MultiRegistration::new(service, vec![existing, registration])?;
                debug!(service = service.name, members = multi.len(), "Appended");
                entries.map.insert(service, (seq, Arc::new(multi)));
                Ok(())
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn find(&self, service: ServiceId) -> Option<Arc<dyn Registration>> {
        self.entries.lock().map.get(&service).map(|(_, registration)| registration.clone())
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, service: ServiceId) -> bool {
        self.entries.lock().map.contains_key(&service)
    }

    /// Copy of all bindings in registration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<(ServiceId, Arc<dyn Registration>)> {
        let entries = self.entries.lock();
        let mut bindings = entries
            .map
            .iter()
            .map(|(service, (seq, registration))| (*seq, *service, registration.clone()))
            .collect::<Vec<_>>();
        drop(entries);

        bindings.sort_unstable_by_key(|(seq, ..)| *seq);
        bindings.into_iter().map(|(_, service, registration)| (service, registration)).collect()
    }

    /// Removes the binding, returning it
    ///
    /// # Errors
    /// Returns [`RegistrationErrorKind::ReadOnly`] if the registry is read-only
    pub fn unregister(&self, service: ServiceId) -> Result<Option<Arc<dyn Registration>>, RegistrationErrorKind> {
        if self.read_only {
            let err = RegistrationErrorKind::ReadOnly;
            error!("{}", err);
            return Err(err);
        }

        let removed = self.entries.lock().map.remove(&service).map(|(_, registration)| registration);
        if removed.is_some() {
            debug!(service = service.name, "Unregistered");
        }
        Ok(removed)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().map.is_empty()
    }

    /// Frozen copy of the registry, every mutation of it fails with [`RegistrationErrorKind::ReadOnly`]
    #[inline]
    #[must_use]
    pub fn read_only(&self) -> Self {
        Self {
            read_only: true,
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

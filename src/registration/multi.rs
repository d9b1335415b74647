use std::sync::Arc;
use tracing::{debug, error};

use super::{Created, Registration, RegistrationKind};
use crate::{
    any::{AnyInstance, MultiInstance, ServiceId},
    context::ResolveContext,
    errors::{InstantiatorErrorKind, RegistrationErrorKind},
    lifetime::{Lifetime, LifetimeSlot},
};

/// Ordered, non-empty group of registrations sharing one service and one lifetime.
///
/// Resolving the service returns the last member, [`crate::Container::resolve_all`] returns every member in order.
/// Nested groups are flattened on insertion.
/// Members hand their lifetime over to the group: while they belong to it, only [`Registration::set_lifetime`]
/// of the group changes it.
pub struct MultiRegistration {
    service: ServiceId,
    slot: LifetimeSlot,
    members: Vec<Arc<dyn Registration>>,
}

impl MultiRegistration {
    /// # Errors
    /// - Returns [`RegistrationErrorKind::EmptyMulti`] if `members` is empty
    /// - Returns [`RegistrationErrorKind::InvalidArgument`] if a member produces another service
    /// - Returns [`RegistrationErrorKind::LifetimeMismatch`] if members have different lifetimes
    pub fn new(service: ServiceId, members: Vec<Arc<dyn Registration>>) -> Result<Self, RegistrationErrorKind> {
        let members = flatten(members);
        let Some(first) = members.first() else {
            return Err(RegistrationErrorKind::EmptyMulti { service: service.name });
        };

        let mut multi = Self {
            service,
            slot: LifetimeSlot::new(first.lifetime()),
            members: Vec::with_capacity(members.len()),
        };
        multi.admit(&members)?;
        multi.members = members;

        Ok(multi)
    }

    /// # Errors
    /// Returns [`RegistrationErrorKind::InvalidArgument`] or [`RegistrationErrorKind::LifetimeMismatch`],
    /// the group is left unchanged in that case
    pub fn add(&mut self, registration: Arc<dyn Registration>) -> Result<(), RegistrationErrorKind> {
        self.add_range([registration])
    }

    /// Adds every registration or none of them
    ///
    /// # Errors
    /// Returns the first validation failure, the group is left unchanged in that case
    pub fn add_range(&mut self, registrations: impl IntoIterator<Item = Arc<dyn Registration>>) -> Result<(), RegistrationErrorKind> {
        let registrations = flatten(registrations);
        self.admit(&registrations)?;

        self.members.extend(registrations);
        Ok(())
    }

    /// # Errors
    /// Returns [`RegistrationErrorKind::InvalidArgument`] if `index > len` or the registration doesn't fit the group
    pub fn insert(&mut self, index: usize, registration: Arc<dyn Registration>) -> Result<(), RegistrationErrorKind> {
        if index > self.members.len() {
            return Err(self.out_of_bounds(index));
        }
        let registrations = flatten([registration]);
        self.admit(&registrations)?;

        self.members.splice(index..index, registrations);
        Ok(())
    }

    /// Returns the replaced member, which no longer belongs to the group
    ///
    /// # Errors
    /// Returns [`RegistrationErrorKind::InvalidArgument`] if `index >= len` or the registration doesn't fit the group
    pub fn replace(&mut self, index: usize, registration: Arc<dyn Registration>) -> Result<Arc<dyn Registration>, RegistrationErrorKind> {
        if index >= self.members.len() {
            return Err(self.out_of_bounds(index));
        }
        if registration.as_multi().is_some() {
            return Err(RegistrationErrorKind::InvalidArgument {
                reason: "a multi-registration can't replace a single member".into(),
            });
        }
        self.admit(core::slice::from_ref(&registration))?;

        let replaced = core::mem::replace(&mut self.members[index], registration);
        replaced.leave_group();
        Ok(replaced)
    }

    /// Returns the removed member, which no longer belongs to the group
    ///
    /// # Errors
    /// - Returns [`RegistrationErrorKind::EmptyMulti`] if it's the last member
    /// - Returns [`RegistrationErrorKind::InvalidArgument`] if `index >= len`
    pub fn remove(&mut self, index: usize) -> Result<Arc<dyn Registration>, RegistrationErrorKind> {
        if index >= self.members.len() {
            return Err(self.out_of_bounds(index));
        }
        if self.members.len() == 1 {
            return Err(RegistrationErrorKind::EmptyMulti {
                service: self.service.name,
            });
        }

        let removed = self.members.remove(index);
        removed.leave_group();
        Ok(removed)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`, a group can't be emptied
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn members(&self) -> &[Arc<dyn Registration>] {
        &self.members
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<dyn Registration>> {
        self.members.get(index)
    }

    /// Joins `registrations` to the group if they and the current members all fit it.
    /// Joining comes first, so a lifetime can't change between the check and the insertion.
    fn admit(&self, registrations: &[Arc<dyn Registration>]) -> Result<(), RegistrationErrorKind> {
        for registration in registrations {
            registration.join_group();
        }

        let result = self.validate(self.members.iter().chain(registrations));
        if result.is_err() {
            for registration in registrations {
                registration.leave_group();
            }
        }
        result
    }

    fn validate<'a>(&self, registrations: impl IntoIterator<Item = &'a Arc<dyn Registration>>) -> Result<(), RegistrationErrorKind> {
        let expected = self.slot.get();
        for registration in registrations {
            let service = registration.service();
            if service != self.service {
                return Err(RegistrationErrorKind::InvalidArgument {
                    reason: format!("`{}` can't be a member of the `{}` group", service.name, self.service.name),
                });
            }

            let actual = registration.lifetime();
            if actual != expected {
                return Err(RegistrationErrorKind::LifetimeMismatch {
                    service: self.service.name,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }

    fn out_of_bounds(&self, index: usize) -> RegistrationErrorKind {
        RegistrationErrorKind::InvalidArgument {
            reason: format!("index {index} is out of bounds for a group of {}", self.members.len()),
        }
    }
}

impl Drop for MultiRegistration {
    fn drop(&mut self) {
        for member in &self.members {
            member.leave_group();
        }
    }
}

fn flatten(registrations: impl IntoIterator<Item = Arc<dyn Registration>>) -> Vec<Arc<dyn Registration>> {
    let mut flat = Vec::new();
    for registration in registrations {
        match registration.as_multi() {
            Some(multi) => flat.extend(multi.members.iter().cloned()),
            None => flat.push(registration),
        }
    }
    flat
}

impl Registration for MultiRegistration {
    #[inline]
    fn service(&self) -> ServiceId {
        self.service
    }

    #[inline]
    fn lifetime(&self) -> Lifetime {
        self.slot.get()
    }

    /// Changes the lifetime of the group and all of its members.
    /// If a member refuses, the members changed so far are restored.
    fn set_lifetime(&self, lifetime: Lifetime) -> Result<(), RegistrationErrorKind> {
        let previous = self.slot.get();
        self.slot.set(self.service.name, lifetime)?;

        for (index, member) in self.members.iter().enumerate() {
            let Err(err) = member.set_group_lifetime(lifetime) else {
                continue;
            };

            for member in &self.members[..index] {
                if let Err(rollback) = member.set_group_lifetime(previous) {
                    error!(member = member.service().name, %previous, "Rollback failed: {}", rollback);
                }
            }
            if let Err(rollback) = self.slot.set(self.service.name, previous) {
                error!(%previous, "Rollback failed: {}", rollback);
            }
            return Err(err);
        }
        Ok(())
    }

    #[inline]
    fn kind(&self) -> RegistrationKind {
        RegistrationKind::Multi
    }

    fn create(&self, context: &ResolveContext<'_>) -> Result<Created, InstantiatorErrorKind> {
        self.slot.freeze();

        let mut instances: Vec<AnyInstance> = Vec::with_capacity(self.members.len());
        let mut disposers = Vec::new();
        for member in &self.members {
            let (instance, member_disposers) = member.create(context)?.into_parts();
            instances.push(instance);
            disposers.extend(member_disposers);
        }

        debug!(members = instances.len(), "Created group");
        Ok(Created::new(Arc::new(MultiInstance(instances)), disposers))
    }

    #[inline]
    fn as_multi(&self) -> Option<&MultiRegistration> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::MultiRegistration;
    use crate::{
        any::ServiceId,
        errors::RegistrationErrorKind,
        lifetime::Lifetime,
        registration::{direct, factory, instance, Registration},
    };

    use std::sync::Arc;
    use tracing_test::traced_test;

    trait Handler: Send + Sync {
        fn name(&self) -> &'static str;
    }

    struct Named(&'static str);

    impl Handler for Named {
        fn name(&self) -> &'static str {
            self.0
        }
    }

    fn handler(name: &'static str) -> Arc<dyn Registration> {
        factory(move |_| Ok(Arc::new(Named(name)) as Arc<dyn Handler>)).shared()
    }

    fn singleton_handler(name: &'static str) -> Arc<dyn Registration> {
        instance(Arc::new(Named(name)) as Arc<dyn Handler>).shared()
    }

    #[test]
    fn test_new_validation() {
        let service = ServiceId::of::<dyn Handler>();

        assert!(matches!(
            MultiRegistration::new(service, vec![]),
            Err(RegistrationErrorKind::EmptyMulti { .. })
        ));
        assert!(matches!(
            MultiRegistration::new(service, vec![handler("a"), singleton_handler("b")]),
            Err(RegistrationErrorKind::LifetimeMismatch {
                expected: Lifetime::Transient,
                actual: Lifetime::Singleton,
                ..
            })
        ));
        assert!(matches!(
            MultiRegistration::new(service, vec![handler("a"), direct::<u8>().shared()]),
            Err(RegistrationErrorKind::InvalidArgument { .. })
        ));

        let multi = MultiRegistration::new(service, vec![handler("a"), handler("b")]).unwrap();
        assert_eq!(multi.len(), 2);
        assert_eq!(multi.lifetime(), Lifetime::Transient);
    }

    #[test]
    fn test_mismatched_add_does_not_mutate() {
        let mut multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![handler("a")]).unwrap();

        assert!(multi.add(singleton_handler("b")).is_err());
        assert!(multi.add_range([handler("b"), singleton_handler("c")]).is_err());
        assert!(multi.insert(0, singleton_handler("b")).is_err());
        assert!(multi.replace(0, singleton_handler("b")).is_err());
        assert_eq!(multi.len(), 1);

        multi.add_range([handler("b"), handler("c")]).unwrap();
        multi.insert(0, handler("d")).unwrap();
        assert_eq!(multi.len(), 4);
    }

    #[test]
    fn test_remove_and_replace() {
        let first = handler("a");
        let mut multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![first.clone()]).unwrap();

        assert!(matches!(multi.remove(0), Err(RegistrationErrorKind::EmptyMulti { .. })));
        assert!(matches!(multi.remove(3), Err(RegistrationErrorKind::InvalidArgument { .. })));

        let replaced = multi.replace(0, handler("b")).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));

        multi.add(handler("c")).unwrap();
        let _ = multi.remove(0).unwrap();
        assert_eq!(multi.len(), 1);
    }

    #[test]
    fn test_nested_flattened() {
        let service = ServiceId::of::<dyn Handler>();
        let inner = MultiRegistration::new(service, vec![handler("a"), handler("b")]).unwrap();

        let mut multi = MultiRegistration::new(service, vec![inner.shared()]).unwrap();
        multi.add(handler("c")).unwrap();

        assert_eq!(multi.len(), 3);
        assert!(multi.members().iter().all(|member| member.as_multi().is_none()));
    }

    #[test]
    fn test_set_lifetime_applies_to_members() {
        let multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![handler("a"), handler("b")]).unwrap();

        multi.set_lifetime(Lifetime::Scoped).unwrap();

        assert_eq!(multi.lifetime(), Lifetime::Scoped);
        assert!(multi.members().iter().all(|member| member.lifetime() == Lifetime::Scoped));
    }

    #[test]
    fn test_member_lifetime_pinned_to_group() {
        let member = handler("a");
        let mut multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![member.clone()]).unwrap();

        assert!(matches!(
            member.set_lifetime(Lifetime::Singleton),
            Err(RegistrationErrorKind::LifetimeGrouped { .. })
        ));
        multi.add(handler("b")).unwrap();
        assert!(multi.members().iter().all(|member| member.lifetime() == multi.lifetime()));

        let removed = multi.remove(0).unwrap();
        removed.set_lifetime(Lifetime::Singleton).unwrap();
        assert_eq!(multi.lifetime(), Lifetime::Transient);
    }

    #[test]
    fn test_group_drop_releases_members() {
        let member = handler("a");
        let multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![member.clone()]).unwrap();
        // The inner group is released once flattened, the outer one keeps the member
        let outer = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![multi.shared()]).unwrap();
        assert!(member.set_lifetime(Lifetime::Scoped).is_err());

        drop(outer);
        member.set_lifetime(Lifetime::Scoped).unwrap();
    }

    #[test]
    fn test_rejected_member_not_pinned() {
        let mut multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![handler("a")]).unwrap();
        let member = factory(|_| Ok(Arc::new(Named("b")) as Arc<dyn Handler>)).scoped().shared();

        assert!(multi.add(member.clone()).is_err());
        member.set_lifetime(Lifetime::Transient).unwrap();
        multi.add(member).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_set_lifetime_rolls_back() {
        let container = crate::Container::new();
        let frozen = handler("b");
        container
            .registry()
            .register(frozen.service(), frozen.clone(), Default::default())
            .unwrap();
        let _ = container.resolve::<dyn Handler>().unwrap();

        let multi = MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![handler("a"), frozen]).unwrap();

        assert!(matches!(
            multi.set_lifetime(Lifetime::Singleton),
            Err(RegistrationErrorKind::LifetimeFrozen { .. })
        ));
        assert_eq!(multi.lifetime(), Lifetime::Transient);
        assert!(multi.members().iter().all(|member| member.lifetime() == Lifetime::Transient));
    }

    #[test]
    fn test_resolve_last_and_all() {
        let container = crate::Container::new();
        container
            .register(MultiRegistration::new(ServiceId::of::<dyn Handler>(), vec![handler("a"), handler("b")]).unwrap())
            .unwrap();

        assert_eq!(container.resolve::<dyn Handler>().unwrap().name(), "b");
        assert_eq!(
            container
                .resolve_all::<dyn Handler>()
                .unwrap()
                .iter()
                .map(|handler| handler.name())
                .collect::<Vec<_>>(),
            ["a", "b"]
        );
    }
}

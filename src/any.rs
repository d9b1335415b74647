use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};
use std::sync::Arc;

use crate::errors::ResolveErrorKind;

/// Opaque token naming a service contract.
///
/// Equality and ordering only look at the [`TypeId`], the name is kept for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ServiceId {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceId {}

impl PartialOrd for ServiceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl ServiceId {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit_once("::").map_or(self.name, |(_, name)| name)
    }
}

/// Type-erased instance as it is cached by lifetime managers.
///
/// For a service `S` the erased value is an `Arc<S>`, for a multi-registration it is a [`MultiInstance`].
pub type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Ordered instances created by a multi-registration.
pub struct MultiInstance(pub(crate) Vec<AnyInstance>);

impl MultiInstance {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &AnyInstance> {
        self.0.iter()
    }
}

#[inline]
#[must_use]
pub(crate) fn erase<S>(instance: Arc<S>) -> AnyInstance
where
    S: ?Sized + Send + Sync + 'static,
{
    Arc::new(instance)
}

/// Recovers a typed `Arc<S>` from an erased instance.
/// A multi instance resolves to its last member, the same way a later registration shadows an earlier one.
pub(crate) fn downcast<S>(instance: &AnyInstance) -> Result<Arc<S>, ResolveErrorKind>
where
    S: ?Sized + Send + Sync + 'static,
{
    if let Some(multi) = instance.downcast_ref::<MultiInstance>() {
        return match multi.0.last() {
            Some(last) => downcast(last),
            None => Err(ResolveErrorKind::IncorrectType {
                expected: type_name::<S>(),
                actual: "empty multi instance",
            }),
        };
    }

    instance.downcast_ref::<Arc<S>>().cloned().ok_or(ResolveErrorKind::IncorrectType {
        expected: type_name::<S>(),
        actual: "unknown",
    })
}

/// Recovers every member of an erased instance, a single instance yields one member.
pub(crate) fn downcast_all<S>(instance: &AnyInstance) -> Result<Vec<Arc<S>>, ResolveErrorKind>
where
    S: ?Sized + Send + Sync + 'static,
{
    match instance.downcast_ref::<MultiInstance>() {
        Some(multi) => multi.0.iter().map(downcast).collect(),
        None => downcast(instance).map(|instance| vec![instance]),
    }
}

#[cfg(test)]
mod tests {
    use super::{downcast, downcast_all, erase, AnyInstance, MultiInstance, ServiceId};
    use crate::errors::ResolveErrorKind;

    use std::sync::Arc;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn test_service_id_eq_by_type() {
        assert_eq!(ServiceId::of::<u8>(), ServiceId::of::<u8>());
        assert_ne!(ServiceId::of::<u8>(), ServiceId::of::<u16>());
        assert_eq!(ServiceId::of::<English>().short_name(), "English");
        assert_eq!(ServiceId::of::<dyn Greeter>().to_string(), core::any::type_name::<dyn Greeter>());
    }

    #[test]
    fn test_downcast_trait_object() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let erased = erase(greeter.clone());

        let resolved = downcast::<dyn Greeter>(&erased).unwrap();
        assert!(Arc::ptr_eq(&greeter, &resolved));
        assert_eq!(resolved.greet(), "hello");

        assert!(matches!(
            downcast::<English>(&erased),
            Err(ResolveErrorKind::IncorrectType { .. })
        ));
    }

    #[test]
    fn test_downcast_multi() {
        let erased: AnyInstance = Arc::new(MultiInstance(vec![erase(Arc::new(1u8)), erase(Arc::new(2u8))]));

        assert_eq!(*downcast::<u8>(&erased).unwrap(), 2);
        assert_eq!(
            downcast_all::<u8>(&erased).unwrap().iter().map(|val| **val).collect::<Vec<_>>(),
            [1, 2]
        );
    }
}

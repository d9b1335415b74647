use core::marker::PhantomData;
use std::sync::Arc;

use super::{RegistrationKind, ServiceRegistration, Strategy};
use crate::{context::ResolveContext, errors::InstantiatorErrorKind, lifetime::Lifetime};

/// Returns the same externally created instance on every call
pub struct Fixed<S: ?Sized>(Arc<S>);

impl<S> Strategy<S> for Fixed<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    const KIND: RegistrationKind = RegistrationKind::Instance;

    #[inline]
    fn produce(&self, _context: &ResolveContext<'_>) -> Result<Arc<S>, InstantiatorErrorKind> {
        Ok(self.0.clone())
    }
}

/// Constructs the service with its [`Default`] implementation
pub struct Direct<T>(PhantomData<fn() -> T>);

impl<T> Strategy<T> for Direct<T>
where
    T: Default + Send + Sync + 'static,
{
    const KIND: RegistrationKind = RegistrationKind::Direct;

    #[inline]
    fn produce(&self, _context: &ResolveContext<'_>) -> Result<Arc<T>, InstantiatorErrorKind> {
        Ok(Arc::new(T::default()))
    }
}

type FactoryFn<S> = dyn Fn(&ResolveContext<'_>) -> anyhow::Result<Arc<S>> + Send + Sync;

/// Calls a user callback with the resolve context
pub struct Factory<S: ?Sized>(Box<FactoryFn<S>>);

impl<S> Strategy<S> for Factory<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    const KIND: RegistrationKind = RegistrationKind::Factory;

    #[inline]
    fn produce(&self, context: &ResolveContext<'_>) -> Result<Arc<S>, InstantiatorErrorKind> {
        (self.0)(context).map_err(Into::into)
    }
}

/// Wrapper to create a registration that just returns passed value.
/// It can be used when the value was created outside the container.
///
/// The registration is a singleton and has no disposal hooks unless they are added,
/// because the instance isn't owned by the container.
#[inline]
#[must_use]
pub fn instance<S>(instance: Arc<S>) -> ServiceRegistration<S, Fixed<S>>
where
    S: ?Sized + Send + Sync + 'static,
{
    ServiceRegistration::new(Fixed(instance), Lifetime::Singleton)
}

/// Creates a transient registration constructing `T` with [`Default`]
#[inline]
#[must_use]
pub fn direct<T>() -> ServiceRegistration<T, Direct<T>>
where
    T: Default + Send + Sync + 'static,
{
    ServiceRegistration::new(Direct(PhantomData), Lifetime::Transient)
}

/// Creates a transient registration calling `factory`.
///
/// Dependencies are resolved through the passed [`ResolveContext`], so they count towards the resolve depth.
///
/// # Examples
/// ```rust
/// use servitor::{factory, Container};
/// use std::sync::Arc;
///
/// struct Database;
/// struct Repository(Arc<Database>);
///
/// let container = Container::new();
/// container.register(factory(|_| Ok(Arc::new(Database))).singleton()).unwrap();
/// container.register(factory(|ctx| Ok(Arc::new(Repository(ctx.resolve()?))))).unwrap();
///
/// let repo = container.resolve::<Repository>().unwrap();
/// assert!(Arc::ptr_eq(&repo.0, &container.resolve::<Database>().unwrap()));
/// ```
#[inline]
#[must_use]
pub fn factory<S, F>(factory: F) -> ServiceRegistration<S, Factory<S>>
where
    S: ?Sized + Send + Sync + 'static,
    F: Fn(&ResolveContext<'_>) -> anyhow::Result<Arc<S>> + Send + Sync + 'static,
{
    ServiceRegistration::new(Factory(Box::new(factory)), Lifetime::Transient)
}

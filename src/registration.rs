mod multi;
mod reflective;
mod strategy;

pub use multi::MultiRegistration;
pub use reflective::{reflective, Arguments, Constructor, Reflective};
pub use strategy::{direct, factory, instance, Direct, Factory, Fixed};

use core::{any::type_name, marker::PhantomData};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::debug;

use crate::{
    any::{erase, AnyInstance, ServiceId},
    context::ResolveContext,
    disposal::{self, AsyncDispose, Disposal, Dispose, Disposer},
    errors::{DisposeErrorKind, InstantiatorErrorKind, RegistrationErrorKind},
    lifetime::{Lifetime, LifetimeSlot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationKind {
    Instance,
    Direct,
    Factory,
    Reflective,
    Multi,
}

/// Instance produced by [`Registration::create`] together with its disposal hooks
pub struct Created {
    pub(crate) instance: AnyInstance,
    pub(crate) disposers: Vec<Disposer>,
}

impl Created {
    #[inline]
    #[must_use]
    pub fn new(instance: AnyInstance, disposers: Vec<Disposer>) -> Self {
        Self { instance, disposers }
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> &AnyInstance {
        &self.instance
    }

    #[inline]
    #[must_use]
    pub fn is_disposable(&self) -> bool {
        !self.disposers.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn into_parts(self) -> (AnyInstance, Vec<Disposer>) {
        (self.instance, self.disposers)
    }

    /// Runs the disposal hooks of an instance that won't be tracked
    ///
    /// # Errors
    /// Returns every failed disposal, the rest are disposed anyway
    #[inline]
    pub fn dispose(self) -> Result<(), DisposeErrorKind> {
        disposal::dispose_all(self.disposers)
    }
}

/// Construction strategy bound to one service identifier, carrying a lifetime tag.
///
/// A registration doesn't own the instances it creates, lifetime managers do.
pub trait Registration: Send + Sync + 'static {
    /// Service the created instances are exposed as
    fn service(&self) -> ServiceId;

    fn lifetime(&self) -> Lifetime;

    /// # Errors
    /// - Returns [`RegistrationErrorKind::LifetimeFrozen`] once an instance has been created
    /// - Returns [`RegistrationErrorKind::LifetimeGrouped`] while the registration belongs to a [`MultiRegistration`]
    fn set_lifetime(&self, lifetime: Lifetime) -> Result<(), RegistrationErrorKind>;

    fn kind(&self) -> RegistrationKind;

    /// Builds one instance. Called at most once per cache key by the owning container.
    ///
    /// # Errors
    /// Returns the cause of the failure, the container wraps it with the resolve chain
    fn create(&self, context: &ResolveContext<'_>) -> Result<Created, InstantiatorErrorKind>;

    #[inline]
    fn as_multi(&self) -> Option<&MultiRegistration> {
        None
    }

    /// Hands the lifetime over to an enclosing [`MultiRegistration`], called once per group the registration joins
    #[inline]
    fn join_group(&self) {}

    #[inline]
    fn leave_group(&self) {}

    /// Lifetime change issued by the enclosing group
    ///
    /// # Errors
    /// Returns [`RegistrationErrorKind::LifetimeFrozen`] once an instance has been created
    #[inline]
    fn set_group_lifetime(&self, lifetime: Lifetime) -> Result<(), RegistrationErrorKind> {
        self.set_lifetime(lifetime)
    }

    #[inline]
    #[must_use]
    fn shared(self) -> Arc<dyn Registration>
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// How a typed registration produces its service
pub trait Strategy<S: ?Sized>: Send + Sync + 'static {
    const KIND: RegistrationKind;

    #[allow(clippy::missing_errors_doc)]
    fn produce(&self, context: &ResolveContext<'_>) -> Result<Arc<S>, InstantiatorErrorKind>;
}

/// Registration of service `S` built by strategy `P`.
///
/// Created with [`instance`], [`direct`], [`factory`] or [`reflective`].
pub struct ServiceRegistration<S: ?Sized, P> {
    strategy: P,
    slot: LifetimeSlot,
    disposal: Disposal<S>,
    _service: PhantomData<fn() -> Arc<S>>,
}

impl<S, P> ServiceRegistration<S, P>
where
    S: ?Sized + Send + Sync + 'static,
    P: Strategy<S>,
{
    #[inline]
    #[must_use]
    pub(crate) fn new(strategy: P, lifetime: Lifetime) -> Self {
        Self {
            strategy,
            slot: LifetimeSlot::new(lifetime),
            disposal: Disposal::default(),
            _service: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_lifetime(self, lifetime: Lifetime) -> Self {
        Self {
            slot: LifetimeSlot::new(lifetime),
            ..self
        }
    }

    #[inline]
    #[must_use]
    pub fn transient(self) -> Self {
        self.with_lifetime(Lifetime::Transient)
    }

    #[inline]
    #[must_use]
    pub fn scoped(self) -> Self {
        self.with_lifetime(Lifetime::Scoped)
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        self.with_lifetime(Lifetime::Singleton)
    }

    /// Adds a synchronous disposal hook, called once for every tracked instance on teardown
    #[inline]
    #[must_use]
    pub fn dispose_with(mut self, dispose: impl Fn(&S) -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        self.disposal.sync = Some(Arc::new(dispose));
        self
    }

    /// Adds an asynchronous disposal hook. It's preferred over the synchronous one.
    #[inline]
    #[must_use]
    pub fn dispose_async_with(
        mut self,
        dispose: impl Fn(Arc<S>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static,
    ) -> Self {
        self.disposal.r#async = Some(Arc::new(dispose));
        self
    }

    /// Disposes created instances with their [`Dispose`] implementation
    #[inline]
    #[must_use]
    pub fn disposable(self) -> Self
    where
        S: Dispose,
    {
        self.dispose_with(|instance: &S| instance.dispose())
    }

    /// Disposes created instances with their [`AsyncDispose`] implementation
    #[inline]
    #[must_use]
    pub fn async_disposable(self) -> Self
    where
        S: AsyncDispose,
    {
        self.dispose_async_with(|instance: Arc<S>| {
            Box::pin(async move { instance.dispose_async().await }) as BoxFuture<'static, anyhow::Result<()>>
        })
    }
}

impl<S, P> Registration for ServiceRegistration<S, P>
where
    S: ?Sized + Send + Sync + 'static,
    P: Strategy<S>,
{
    #[inline]
    fn service(&self) -> ServiceId {
        ServiceId::of::<S>()
    }

    #[inline]
    fn lifetime(&self) -> Lifetime {
        self.slot.get()
    }

    #[inline]
    fn set_lifetime(&self, lifetime: Lifetime) -> Result<(), RegistrationErrorKind> {
        self.slot.set(type_name::<S>(), lifetime)
    }

    #[inline]
    fn kind(&self) -> RegistrationKind {
        P::KIND
    }

    #[inline]
    fn join_group(&self) {
        self.slot.join();
    }

    #[inline]
    fn leave_group(&self) {
        self.slot.leave();
    }

    #[inline]
    fn set_group_lifetime(&self, lifetime: Lifetime) -> Result<(), RegistrationErrorKind> {
        self.slot.set_grouped(type_name::<S>(), lifetime)
    }

    fn create(&self, context: &ResolveContext<'_>) -> Result<Created, InstantiatorErrorKind> {
        self.slot.freeze();

        let instance = self.strategy.produce(context)?;
        let disposers = self.disposal.bind(type_name::<S>(), &instance).into_iter().collect();

        debug!(kind = ?P::KIND, "Created");
        Ok(Created::new(erase(instance), disposers))
    }
}

use core::{
    any::type_name,
    sync::atomic::{AtomicBool, Ordering},
};
use std::sync::Arc;
use tracing::{debug, error, info_span};

use crate::{
    any::{downcast, downcast_all, AnyInstance, ServiceId},
    config::{Config, ResolveMode, ResolveOptions},
    context::ResolveContext,
    disposal,
    errors::{ContainerErrorKind, DisposeErrorKind, InstantiatorErrorKind, RegistrationErrorKind, ResolveErrorKind},
    managers::{LifetimeManager, LifetimeManagers},
    registration::{direct, factory, instance, Registration},
    registry::{RegisterMode, Registry},
    scope::{Scope, ScopeKey},
    selector::ConstructionPolicy,
    trace::{Trace, TraceLevel},
};

/// Service container: a registry of registrations and the lifetime managers owning the created instances.
///
/// Cloning is cheap, clones share the same state.
/// The container is disposed with [`Self::dispose`] or when the last clone is dropped.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates container with the default config and the transient, scoped and singleton lifetime managers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Registry::new(), LifetimeManagers::default(), Config::default())
    }

    #[inline]
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    fn from_parts(registry: Registry, managers: LifetimeManagers, config: Config) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry,
                managers,
                config,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> Config {
        self.inner.config
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Container {
    /// Registers a service, failing if it's already registered
    ///
    /// # Errors
    /// - Returns [`RegistrationErrorKind::Disposed`] if the container is disposed
    /// - Returns the errors of [`Registry::register`]
    #[inline]
    pub fn register(&self, registration: impl Registration) -> Result<(), RegistrationErrorKind> {
        self.register_with_mode(registration, RegisterMode::Throw)
    }

    /// # Errors
    /// - Returns [`RegistrationErrorKind::Disposed`] if the container is disposed
    /// - Returns the errors of [`Registry::register`]
    pub fn register_with_mode(&self, registration: impl Registration, mode: RegisterMode) -> Result<(), RegistrationErrorKind> {
        if self.is_disposed() {
            let err = RegistrationErrorKind::Disposed;
            error!("{}", err);
            return Err(err);
        }
        self.inner.registry.register(registration.service(), registration.shared(), mode)
    }

    /// Registers an externally created instance as a singleton
    ///
    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_instance<S>(&self, value: Arc<S>) -> Result<(), RegistrationErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.register(instance(value))
    }

    /// Registers a transient factory
    ///
    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_factory<S, F>(&self, f: F) -> Result<(), RegistrationErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>) -> anyhow::Result<Arc<S>> + Send + Sync + 'static,
    {
        self.register(factory(f))
    }

    /// Registers `T` as transient, constructed with [`Default`]
    ///
    /// # Errors
    /// See [`Self::register`]
    #[inline]
    pub fn register_direct<T>(&self) -> Result<(), RegistrationErrorKind>
    where
        T: Default + Send + Sync + 'static,
    {
        self.register(direct::<T>())
    }
}

impl Container {
    /// Resolves a service in the global scope
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NotFound`] if the service isn't registered
    /// - Returns [`ResolveErrorKind::DepthExceeded`] if the dependency chain is deeper than [`Config::max_depth`]
    /// - Returns [`ResolveErrorKind::Select`] if no constructor of the service can be chosen
    /// - Returns [`ResolveErrorKind::ResolveFailed`] if the service or one of its dependencies can't be created
    /// - Returns [`ResolveErrorKind::Disposed`] if the container is disposed
    #[inline]
    pub fn resolve<S>(&self) -> Result<Arc<S>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_required(ResolveOptions::new())
    }

    /// Resolves a service in the scope `scope`.
    /// Scoped instances are shared within one scope, singletons are shared across all of them.
    ///
    /// # Errors
    /// See [`Self::resolve`]
    #[inline]
    pub fn resolve_scoped<S>(&self, scope: ScopeKey) -> Result<Arc<S>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_required(ResolveOptions::new().scope(scope))
    }

    /// Resolves a service, returning `None` if it isn't registered
    ///
    /// # Errors
    /// See [`Self::resolve`]. Unregistered dependencies of a registered service are still errors.
    #[inline]
    pub fn try_resolve<S>(&self) -> Result<Option<Arc<S>>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with(ResolveOptions::new().mode(ResolveMode::ReturnDefault))
    }

    /// Resolves a service with per-call options.
    /// Returns `None` only in [`ResolveMode::ReturnDefault`] if the service isn't registered.
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn resolve_with<S>(&self, options: ResolveOptions) -> Result<Option<Arc<S>>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_id(ServiceId::of::<S>(), options)?
            .as_ref()
            .map(downcast::<S>)
            .transpose()
    }

    /// Resolves every member of a multi-registered service in registration order.
    /// A single registration yields one instance.
    ///
    /// # Errors
    /// See [`Self::resolve`]
    #[inline]
    pub fn resolve_all<S>(&self) -> Result<Vec<Arc<S>>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_all_with(ResolveOptions::new())
    }

    /// Like [`Self::resolve_all`], an unregistered service yields no instances in [`ResolveMode::ReturnDefault`]
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn resolve_all_with<S>(&self, options: ResolveOptions) -> Result<Vec<Arc<S>>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        match self.resolve_id(ServiceId::of::<S>(), options)? {
            Some(instance) => downcast_all(&instance),
            None => Ok(Vec::new()),
        }
    }

    /// Resolves a service by its identifier, returning the erased instance
    ///
    /// # Errors
    /// See [`Self::resolve`]
    pub fn resolve_id(&self, service: ServiceId, options: ResolveOptions) -> Result<Option<AnyInstance>, ResolveErrorKind> {
        let trace = cfg!(feature = "diagnostics").then(Trace::new);
        let policy = options.policy.unwrap_or(self.inner.config.construction_policy);
        let context = ResolveContext::root(self, service, options.scope, policy, trace.as_ref());

        match self.resolve_in(&context) {
            Ok(instance) => Ok(Some(instance)),
            Err(ResolveErrorKind::NotFound { .. }) if options.mode == ResolveMode::ReturnDefault => {
                debug!(service = service.name, "Not registered, default returned");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn resolve_required<S>(&self, options: ResolveOptions) -> Result<Arc<S>, ResolveErrorKind>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.resolve_with(options)?
            .ok_or(ResolveErrorKind::NotFound { service: type_name::<S>() })
    }

    /// Resolves one node of the dependency graph
    pub(crate) fn resolve_in(&self, context: &ResolveContext<'_>) -> Result<AnyInstance, ResolveErrorKind> {
        let service = context.service();
        let span = info_span!("resolve", service = service.short_name(), depth = context.depth());
        let _guard = span.enter();

        record(context, TraceLevel::Debug, || format!("Resolving `{service}`"));

        if self.is_disposed() {
            return Err(fail(context, ResolveErrorKind::Disposed));
        }

        let max_depth = self.inner.config.max_depth;
        if context.depth() > max_depth {
            let chain = context.chain();
            return Err(fail(context, ResolveErrorKind::DepthExceeded { max_depth, chain }));
        }

        let Some(registration) = self.inner.registry.find(service) else {
            return Err(fail(context, ResolveErrorKind::NotFound { service: service.name }));
        };

        let lifetime = registration.lifetime();
        let Some(manager) = self.inner.managers.get(lifetime) else {
            return Err(fail(context, ResolveErrorKind::NoLifetimeManager { lifetime }));
        };

        let scope = context.scope();
        if let Some(instance) = manager.resolve(context, scope) {
            debug!(%lifetime, "Found in cache");
            return Ok(instance);
        }

        // Only callers of the same key wait here, the second check sees what the first one built
        let key_lock = manager.key_lock(context, scope);
        let _key_guard = key_lock.as_ref().map(|lock| lock.lock());
        if key_lock.is_some() {
            if let Some(instance) = manager.resolve(context, scope) {
                debug!(%lifetime, "Found in cache after waiting");
                return Ok(instance);
            }
        }
        debug!(%lifetime, "Not found in cache");

        let created = match registration.create(context) {
            Ok(created) => created,
            Err(err) => return Err(creation_failed(context, err)),
        };
        let instance = created.instance().clone();

        if let Err(err) = manager.track(context, created, scope) {
            return Err(fail(context, ResolveErrorKind::Lifetime(err)));
        }
        record(context, TraceLevel::Info, || format!("Resolved `{service}` as {lifetime}"));

        Ok(instance)
    }
}

/// Wraps a creation failure unless it already describes the whole chain
fn creation_failed(context: &ResolveContext<'_>, err: InstantiatorErrorKind) -> ResolveErrorKind {
    match err {
        InstantiatorErrorKind::Select(err) => ResolveErrorKind::Select(err),
        InstantiatorErrorKind::Deps(err) if err.is_terminal() => *err,
        source => {
            error!("Create failed: {}", source);
            record(context, TraceLevel::Error, || format!("Creating `{}` failed: {source}", context.service()));

            let err = ResolveErrorKind::ResolveFailed {
                service: context.service().name,
                chain: context.chain(),
                trace: context.trace().map(Trace::render),
                source,
            };
            error!("{}", err);
            err
        }
    }
}

/// Logs the error, appends it to the trace and returns it
fn fail(context: &ResolveContext<'_>, err: ResolveErrorKind) -> ResolveErrorKind {
    error!("{}", err);
    record(context, TraceLevel::Error, || err.to_string());
    err
}

#[inline]
fn record(context: &ResolveContext<'_>, level: TraceLevel, message: impl FnOnce() -> String) {
    if cfg!(feature = "diagnostics") {
        if let Some(trace) = context.trace() {
            trace.push(level, context.depth(), message());
        }
    }
}

impl Container {
    /// Creates a handle of a fresh scope
    #[inline]
    #[must_use]
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    pub(crate) fn dispose_scope(&self, scope: ScopeKey) -> Result<(), DisposeErrorKind> {
        disposal::dispose_all(self.inner.scope_disposers(scope))
    }

    pub(crate) async fn dispose_scope_async(&self, scope: ScopeKey) -> Result<(), DisposeErrorKind> {
        disposal::dispose_all_async(self.inner.scope_disposers(scope)).await
    }

    /// Disposes every tracked instance, manager by manager in tracking order.
    /// Later resolutions and registrations fail with `Disposed`. Calling it again does nothing.
    ///
    /// # Warning
    /// Asynchronous disposal hooks are driven to completion on the current thread, inside an async runtime use [`Self::dispose_async`]
    ///
    /// # Errors
    /// Returns every failed disposal, the rest are disposed anyway
    #[inline]
    pub fn dispose(&self) -> Result<(), DisposeErrorKind> {
        self.inner.dispose()
    }

    /// # Errors
    /// Returns every failed disposal, the rest are disposed anyway
    pub async fn dispose_async(&self) -> Result<(), DisposeErrorKind> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut result = Ok(());
        for manager in self.inner.managers.iter() {
            result = merge(result, manager.dispose_all_async().await);
        }
        debug!("Container disposed");
        result
    }
}

pub(crate) struct ContainerInner {
    registry: Registry,
    managers: LifetimeManagers,
    config: Config,
    disposed: AtomicBool,
}

impl ContainerInner {
    fn scope_disposers(&self, scope: ScopeKey) -> Vec<disposal::Disposer> {
        self.managers.iter().flat_map(|manager| manager.dispose_scope(scope)).collect()
    }

    fn dispose(&self) -> Result<(), DisposeErrorKind> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut result = Ok(());
        for manager in self.managers.iter() {
            result = merge(result, manager.dispose_all());
        }
        debug!("Container disposed");
        result
    }
}

fn merge(left: Result<(), DisposeErrorKind>, right: Result<(), DisposeErrorKind>) -> Result<(), DisposeErrorKind> {
    match (left, right) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
        (Err(left), Err(right)) => Err(left.merge(right)),
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            error!("{}", err);
        }
        debug!("Container closed on drop");
    }
}

/// Builder of a [`Container`] with a custom config, registry or lifetime managers
#[derive(Default)]
pub struct ContainerBuilder {
    config: Config,
    registry: Registry,
    managers: LifetimeManagers,
}

impl ContainerBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    #[inline]
    #[must_use]
    pub fn construction_policy(mut self, policy: ConstructionPolicy) -> Self {
        self.config.construction_policy = policy;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Uses a prepared registry, a read-only one makes the container reject registrations
    #[inline]
    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a manager for its [`LifetimeManager::lifetime`], replacing the built-in one for that lifetime if any
    #[inline]
    #[must_use]
    pub fn lifetime_manager(mut self, manager: impl LifetimeManager) -> Self {
        self.managers.insert(Arc::new(manager));
        self
    }

    /// # Errors
    /// Returns [`ContainerErrorKind::InvalidArgument`] if `max_depth` is 0
    pub fn build(self) -> Result<Container, ContainerErrorKind> {
        if self.config.max_depth == 0 {
            let err = ContainerErrorKind::InvalidArgument {
                reason: "max_depth must be at least 1",
            };
            error!("{}", err);
            return Err(err);
        }

        Ok(Container::from_parts(self.registry, self.managers, self.config))
    }
}

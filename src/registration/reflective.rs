use core::any::type_name;
use std::{collections::VecDeque, sync::Arc};
use tracing::debug;

use super::{RegistrationKind, ServiceRegistration, Strategy};
use crate::{
    any::{downcast, AnyInstance, ServiceId},
    context::ResolveContext,
    errors::{InstantiatorErrorKind, ResolveErrorKind},
    lifetime::Lifetime,
    selector::{select, Candidate},
};

type BuildFn<S> = dyn Fn(&mut Arguments) -> anyhow::Result<Arc<S>> + Send + Sync;

/// Construction candidate of a reflective registration.
///
/// The parameters are declared explicitly and resolved in declaration order before `build` is called.
pub struct Constructor<S: ?Sized> {
    parameters: Vec<ServiceId>,
    preferred: bool,
    build: Arc<BuildFn<S>>,
}

impl<S> Constructor<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    #[inline]
    #[must_use]
    pub fn new(build: impl Fn(&mut Arguments) -> anyhow::Result<Arc<S>> + Send + Sync + 'static) -> Self {
        Self {
            parameters: Vec::new(),
            preferred: false,
            build: Arc::new(build),
        }
    }

    /// Declares the next parameter
    #[inline]
    #[must_use]
    pub fn param<D: ?Sized + 'static>(mut self) -> Self {
        self.parameters.push(ServiceId::of::<D>());
        self
    }

    /// Marks the constructor as preferred, [`crate::ConstructionPolicy::Mixed`] picks it regardless of the registry content
    #[inline]
    #[must_use]
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }
}

impl<S: ?Sized> Candidate for Constructor<S> {
    #[inline]
    fn parameters(&self) -> &[ServiceId] {
        &self.parameters
    }

    #[inline]
    fn is_preferred(&self) -> bool {
        self.preferred
    }
}

/// Resolved parameters handed to a [`Constructor`], in declaration order
pub struct Arguments {
    values: VecDeque<(ServiceId, AnyInstance)>,
}

impl Arguments {
    #[inline]
    #[must_use]
    fn with_capacity(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Takes the next argument
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the next declared parameter isn't `D` or there are no arguments left
    pub fn next<D>(&mut self) -> Result<Arc<D>, ResolveErrorKind>
    where
        D: ?Sized + Send + Sync + 'static,
    {
        match self.values.pop_front() {
            Some((service, instance)) if service == ServiceId::of::<D>() => downcast(&instance),
            Some((service, _)) => Err(ResolveErrorKind::IncorrectType {
                expected: type_name::<D>(),
                actual: service.name,
            }),
            None => Err(ResolveErrorKind::IncorrectType {
                expected: type_name::<D>(),
                actual: "no argument",
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Picks one of the constructors with the context's construction policy and resolves its parameters
pub struct Reflective<S: ?Sized> {
    constructors: Vec<Constructor<S>>,
}

impl<S> Strategy<S> for Reflective<S>
where
    S: ?Sized + Send + Sync + 'static,
{
    const KIND: RegistrationKind = RegistrationKind::Reflective;

    fn produce(&self, context: &ResolveContext<'_>) -> Result<Arc<S>, InstantiatorErrorKind> {
        let (index, constructor) =
            select(type_name::<S>(), &self.constructors, context.registry(), context.policy()).map_err(InstantiatorErrorKind::Select)?;
        debug!(index, parameters = constructor.parameters.len(), "Constructor selected");

        let mut arguments = Arguments::with_capacity(constructor.parameters.len());
        for parameter in &constructor.parameters {
            let instance = context.resolve_id(*parameter)?;
            arguments.values.push_back((*parameter, instance));
        }

        (constructor.build)(&mut arguments).map_err(Into::into)
    }
}

impl<S> ServiceRegistration<S, Reflective<S>>
where
    S: ?Sized + Send + Sync + 'static,
{
    /// Adds another construction candidate, declaration order breaks ties between candidates
    #[inline]
    #[must_use]
    pub fn or_constructor(mut self, constructor: Constructor<S>) -> Self {
        self.strategy.constructors.push(constructor);
        self
    }
}

/// Creates a transient registration constructed by one of the declared constructors.
///
/// # Examples
/// ```rust
/// use servitor::{direct, reflective, Constructor, Container};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Database;
/// struct Service(Option<Arc<Database>>);
///
/// let container = Container::new();
/// container.register(direct::<Database>()).unwrap();
/// container
///     .register(
///         reflective(Constructor::new(|_| Ok(Arc::new(Service(None)))))
///             .or_constructor(Constructor::new(|args| Ok(Arc::new(Service(Some(args.next()?))))).param::<Database>()),
///     )
///     .unwrap();
///
/// // The constructor with the most resolvable parameters wins
/// assert!(container.resolve::<Service>().unwrap().0.is_some());
/// ```
#[inline]
#[must_use]
pub fn reflective<S>(constructor: Constructor<S>) -> ServiceRegistration<S, Reflective<S>>
where
    S: ?Sized + Send + Sync + 'static,
{
    ServiceRegistration::new(
        Reflective {
            constructors: vec![constructor],
        },
        Lifetime::Transient,
    )
}

#[cfg(test)]
mod tests {
    use super::{reflective, Constructor};
    use crate::{
        errors::{ResolveErrorKind, SelectErrorKind},
        registration::direct,
        ConstructionPolicy, Container, ResolveOptions,
    };

    use core::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Logger;
    #[derive(Default)]
    struct Database;
    struct Cache;

    #[derive(Debug, PartialEq, Eq)]
    enum Built {
        Empty,
        WithLogger,
        WithLoggerAndDatabase,
        WithCache,
    }

    #[derive(Debug)]
    struct Service(Built);

    fn service_registration(preferred_cache: bool) -> crate::ServiceRegistration<Service, super::Reflective<Service>> {
        let with_cache = Constructor::new(|args| {
            let _ = args.next::<Cache>()?;
            Ok(Arc::new(Service(Built::WithCache)))
        })
        .param::<Cache>();

        reflective(Constructor::new(|_| Ok(Arc::new(Service(Built::Empty)))))
            .or_constructor(
                Constructor::new(|args| {
                    let _ = args.next::<Logger>()?;
                    Ok(Arc::new(Service(Built::WithLogger)))
                })
                .param::<Logger>(),
            )
            .or_constructor(
                Constructor::new(|args| {
                    let _ = args.next::<Logger>()?;
                    let _ = args.next::<Database>()?;
                    Ok(Arc::new(Service(Built::WithLoggerAndDatabase)))
                })
                .param::<Logger>()
                .param::<Database>(),
            )
            .or_constructor(if preferred_cache { with_cache.preferred() } else { with_cache })
    }

    #[test]
    #[traced_test]
    fn test_prefer_complex_picks_most_resolvable() {
        let container = Container::new();
        container.register(direct::<Logger>()).unwrap();
        container.register(service_registration(false)).unwrap();

        assert_eq!(container.resolve::<Service>().unwrap().0, Built::WithLogger);

        container.register(direct::<Database>()).unwrap();
        assert_eq!(container.resolve::<Service>().unwrap().0, Built::WithLoggerAndDatabase);
    }

    #[test]
    #[traced_test]
    fn test_policy_per_resolve() {
        let container = Container::new();
        container.register(direct::<Logger>()).unwrap();
        container.register(service_registration(false)).unwrap();

        let service = container
            .resolve_with::<Service>(ResolveOptions::new().policy(ConstructionPolicy::PreferParameterless))
            .unwrap()
            .unwrap();
        assert_eq!(service.0, Built::Empty);
    }

    #[test]
    #[traced_test]
    fn test_preferred_ignores_resolvability() {
        let container = Container::new();
        container.register(service_registration(true)).unwrap();

        // `Cache` is never registered, so the preferred constructor fails during parameter resolution
        let err = container.resolve::<Service>().unwrap_err();
        assert!(matches!(err.root_cause(), ResolveErrorKind::NotFound { .. }));
    }

    #[test]
    #[traced_test]
    fn test_no_viable_constructor() {
        let container = Container::new();
        container
            .register(reflective(
                Constructor::new(|args| {
                    let _ = args.next::<Cache>()?;
                    Ok(Arc::new(Service(Built::WithCache)))
                })
                .param::<Cache>(),
            ))
            .unwrap();

        assert!(matches!(
            container.resolve::<Service>(),
            Err(ResolveErrorKind::Select(SelectErrorKind::NoViableConstructor { .. }))
        ));
    }

    #[test]
    #[traced_test]
    fn test_parameters_resolved_once_per_call() {
        let logger_call_count = Arc::new(AtomicU8::new(0));

        let container = Container::new();
        container
            .register(crate::factory({
                let logger_call_count = logger_call_count.clone();
                move |_| {
                    logger_call_count.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Logger))
                }
            }))
            .unwrap();
        container.register(service_registration(false)).unwrap();

        let _ = container.resolve::<Service>().unwrap();
        let _ = container.resolve::<Service>().unwrap();

        assert_eq!(logger_call_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_arguments_type_check() {
        let mut arguments = super::Arguments::with_capacity(1);
        arguments
            .values
            .push_back((crate::ServiceId::of::<Logger>(), crate::any::erase(Arc::new(Logger))));

        assert!(matches!(
            arguments.next::<Database>(),
            Err(ResolveErrorKind::IncorrectType { .. })
        ));
        assert!(arguments.is_empty());
    }
}

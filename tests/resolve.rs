use servitor::{
    direct, factory, reflective, Constructor, Container, Dispose, MultiRegistration, RegisterMode, Registration,
    RegistrationErrorKind, ResolveErrorKind, ScopeKey, ServiceId,
};
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

trait IFoo: Send + Sync {
    fn id(&self) -> usize;
}

#[derive(Default)]
struct Foo {
    disposed: AtomicU8,
}

impl IFoo for Foo {
    fn id(&self) -> usize {
        self as *const Self as usize
    }
}

impl Dispose for Foo {
    fn dispose(&self) -> anyhow::Result<()> {
        self.disposed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

trait IBar: Send + Sync {}

#[test]
fn singleton_returns_same_reference() {
    let container = Container::new();
    container
        .register(factory(|_| Ok(Arc::new(Foo::default()) as Arc<dyn IFoo>)).singleton())
        .unwrap();

    let foo_1 = container.resolve::<dyn IFoo>().unwrap();
    let foo_2 = container.resolve::<dyn IFoo>().unwrap();

    assert!(Arc::ptr_eq(&foo_1, &foo_2));
    assert_eq!(foo_1.id(), foo_2.id());
}

#[test]
fn transient_disposed_on_teardown() {
    let container = Container::new();
    container.register(direct::<Foo>().disposable()).unwrap();

    let foo_1 = container.resolve::<Foo>().unwrap();
    let foo_2 = container.resolve::<Foo>().unwrap();
    assert!(!Arc::ptr_eq(&foo_1, &foo_2));

    container.dispose().unwrap();
    container.dispose().unwrap();

    assert_eq!(foo_1.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(foo_2.disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_service_not_found() {
    let container = Container::new();

    assert!(matches!(
        container.resolve::<dyn IBar>(),
        Err(ResolveErrorKind::NotFound { .. })
    ));
    assert!(container.try_resolve::<dyn IBar>().unwrap().is_none());
}

#[test]
fn scoped_per_key() {
    let container = Container::new();
    container
        .register(factory(|_| Ok(Arc::new(Foo::default()) as Arc<dyn IFoo>)).scoped())
        .unwrap();

    let (a, b) = (ScopeKey::new(), ScopeKey::new());
    let a_1 = container.resolve_scoped::<dyn IFoo>(a).unwrap();
    let a_2 = container.resolve_scoped::<dyn IFoo>(a).unwrap();
    let b_1 = container.resolve_scoped::<dyn IFoo>(b).unwrap();

    assert!(Arc::ptr_eq(&a_1, &a_2));
    assert!(!Arc::ptr_eq(&a_1, &b_1));
    assert!(!Arc::ptr_eq(&a_2, &b_1));
}

#[test]
fn every_tracked_instance_disposed_once() {
    let container = Container::new();
    container.register(direct::<Foo>().scoped().disposable()).unwrap();

    let scope = container.create_scope();
    let scoped = scope.resolve::<Foo>().unwrap();
    let global = container.resolve::<Foo>().unwrap();

    container.dispose().unwrap();
    // The scope outlived the container teardown, its own disposal has nothing left to do
    scope.dispose().unwrap();
    drop(scope);

    assert_eq!(scoped.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(global.disposed.load(Ordering::SeqCst), 1);
}

#[test]
fn scope_handle_disposes_on_drop() {
    let container = Container::new();
    container.register(direct::<Foo>().scoped().disposable()).unwrap();

    let scoped = {
        let scope = container.create_scope();
        scope.resolve::<Foo>().unwrap()
    };
    let global = container.resolve::<Foo>().unwrap();

    assert_eq!(scoped.disposed.load(Ordering::SeqCst), 1);
    assert_eq!(global.disposed.load(Ordering::SeqCst), 0);
}

#[test]
fn multi_registration_through_append() {
    let container = Container::new();
    for value in [1u8, 2, 3] {
        container
            .register_with_mode(factory(move |_| Ok(Arc::new(value))), RegisterMode::Append)
            .unwrap();
    }

    assert_eq!(*container.resolve::<u8>().unwrap(), 3);
    assert_eq!(
        container.resolve_all::<u8>().unwrap().iter().map(|value| **value).collect::<Vec<_>>(),
        [1, 2, 3]
    );
    assert!(matches!(
        container.register_with_mode(factory(|_| Ok(Arc::new(4u8))).singleton(), RegisterMode::Append),
        Err(RegistrationErrorKind::AlreadyRegistered { .. })
    ));
}

#[test]
fn multi_registration_lifetimes() {
    let service = ServiceId::of::<u8>();
    let transient = || factory(|_| Ok(Arc::new(1u8))).shared();
    let singleton = || factory(|_| Ok(Arc::new(1u8))).singleton().shared();

    assert!(matches!(
        MultiRegistration::new(service, vec![transient(), singleton()]),
        Err(RegistrationErrorKind::LifetimeMismatch { .. })
    ));

    let mut multi = MultiRegistration::new(service, vec![singleton(), singleton()]).unwrap();
    assert!(multi.add(transient()).is_err());
    assert_eq!(multi.len(), 2);

    multi.remove(0).unwrap();
    assert!(matches!(multi.remove(0), Err(RegistrationErrorKind::EmptyMulti { .. })));
}

#[test]
fn reflective_graph() {
    struct Repository(Arc<dyn IFoo>);
    struct Handler {
        repository: Arc<Repository>,
        foo: Arc<dyn IFoo>,
    }

    let container = Container::new();
    container
        .register(factory(|_| Ok(Arc::new(Foo::default()) as Arc<dyn IFoo>)).singleton())
        .unwrap();
    container
        .register(reflective(Constructor::new(|args| Ok(Arc::new(Repository(args.next()?)))).param::<dyn IFoo>()).scoped())
        .unwrap();
    container
        .register(reflective(
            Constructor::new(|args| {
                Ok(Arc::new(Handler {
                    repository: args.next()?,
                    foo: args.next()?,
                }))
            })
            .param::<Repository>()
            .param::<dyn IFoo>(),
        ))
        .unwrap();

    let scope = container.create_scope();
    let handler_1 = scope.resolve::<Handler>().unwrap();
    let handler_2 = scope.resolve::<Handler>().unwrap();

    assert!(!Arc::ptr_eq(&handler_1, &handler_2));
    assert!(Arc::ptr_eq(&handler_1.repository, &handler_2.repository));
    assert!(Arc::ptr_eq(&handler_1.foo, &handler_1.repository.0));
}

#[test]
fn registration_lifetime_frozen() {
    let container = Container::new();
    let registration = direct::<Foo>().shared();
    container
        .registry()
        .register(ServiceId::of::<Foo>(), registration.clone(), RegisterMode::Throw)
        .unwrap();

    registration.set_lifetime(servitor::Lifetime::Singleton).unwrap();
    let foo_1 = container.resolve::<Foo>().unwrap();
    let foo_2 = container.resolve::<Foo>().unwrap();

    assert!(Arc::ptr_eq(&foo_1, &foo_2));
    assert!(registration.set_lifetime(servitor::Lifetime::Transient).is_err());
}

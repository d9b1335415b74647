pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod disposal;
pub(crate) mod lifetime;
pub(crate) mod managers;
pub(crate) mod registration;
pub(crate) mod registry;
pub(crate) mod scope;
pub(crate) mod selector;
pub(crate) mod trace;

pub mod errors;

pub use any::{AnyInstance, MultiInstance, ServiceId};
pub use config::{Config, ResolveMode, ResolveOptions};
pub use container::{Container, ContainerBuilder};
pub use context::ResolveContext;
pub use disposal::{AsyncDispose, Dispose, Disposer};
pub use errors::{
    ContainerErrorKind, DisposeErrorKind, DisposeFailure, InstantiatorErrorKind, LifetimeErrorKind, RegistrationErrorKind,
    ResolveErrorKind, SelectErrorKind,
};
pub use lifetime::Lifetime;
pub use managers::{LifetimeManager, ScopedLifetimeManager, SingletonLifetimeManager, TransientLifetimeManager};
pub use registration::{
    direct, factory, instance, reflective, Arguments, Constructor, Created, Direct, Factory, Fixed, MultiRegistration, Reflective,
    Registration, RegistrationKind, ServiceRegistration, Strategy,
};
pub use registry::{RegisterMode, Registry};
pub use scope::{Scope, ScopeKey};
pub use selector::{select, Candidate, CandidateInfo, ConstructionPolicy};
pub use trace::{Trace, TraceEntry, TraceLevel};

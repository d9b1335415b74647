mod container;
mod dispose;
mod instantiator;
mod lifetime;
mod registration;
mod resolve;
mod select;

pub use container::ContainerErrorKind;
pub use dispose::{DisposeErrorKind, DisposeFailure};
pub use instantiator::InstantiatorErrorKind;
pub use lifetime::LifetimeErrorKind;
pub use registration::RegistrationErrorKind;
pub use resolve::ResolveErrorKind;
pub use select::SelectErrorKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectErrorKind {
    #[error("No constructor of `{service}` has all of its parameters registered")]
    NoViableConstructor { service: &'static str },
    #[error("`{service}` has no parameterless constructor")]
    NoParameterlessConstructor { service: &'static str },
}

#[derive(thiserror::Error, Debug)]
pub enum ContainerErrorKind {
    #[error("Invalid container configuration: {reason}")]
    InvalidArgument { reason: &'static str },
}

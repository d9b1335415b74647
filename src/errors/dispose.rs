use core::fmt::{self, Display, Formatter};

#[derive(thiserror::Error, Debug)]
#[error("Failed to dispose `{service}`: {error}")]
pub struct DisposeFailure {
    pub service: &'static str,
    #[source]
    pub error: anyhow::Error,
}

#[derive(thiserror::Error, Debug)]
pub enum DisposeErrorKind {
    Failed { failures: Vec<DisposeFailure> },
}

impl DisposeErrorKind {
    #[must_use]
    pub fn failures(&self) -> &[DisposeFailure] {
        match self {
            Self::Failed { failures } => failures,
        }
    }

    pub(crate) fn merge(self, other: Self) -> Self {
        let (Self::Failed { mut failures }, Self::Failed { failures: other }) = (self, other);
        failures.extend(other);
        Self::Failed { failures }
    }
}

impl Display for DisposeErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { failures } => {
                write!(f, "{} instance(s) failed to dispose", failures.len())?;
                for failure in failures {
                    write!(f, "; {failure}")?;
                }
            }
        }
        Ok(())
    }
}

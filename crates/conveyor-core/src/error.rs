//! Error types shared across the server core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// An entity identity did not resolve in the store.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional update observed a concurrent change. This is the
    /// expected outcome of two agents racing on the same stage.
    #[error("optimistic lock error")]
    OptimisticLock,

    /// The operation is not valid for the entity's current state.
    #[error("{0}")]
    InvalidState(String),

    /// The caller's cancellation signal fired before completion.
    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),

    /// Aggregated failures from independent cleanup operations.
    #[error("{}", join(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Collapse accumulated errors: empty is success, a single error is
    /// returned as-is, anything more becomes `Multiple`.
    pub fn collect(mut errs: Vec<Error>) -> Result<()> {
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(Error::Multiple(errs)),
        }
    }

    pub fn is_optimistic_lock(&self) -> bool {
        matches!(self, Error::OptimisticLock)
    }
}

fn join(errs: &[Error]) -> String {
    errs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

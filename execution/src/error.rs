use crate::condition::ConditionError;
use nexus_types::ObjectError;
use std::fmt;
use thiserror::Error;

/// Coarse classification of a rejected contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bytes failed to parse or a condition program is ill-formed.
    Malformed,
    /// Caller is not the owner, or a condition did not hold.
    Unauthorized,
    /// Balance, type or uniqueness rule broken.
    Invariant,
    /// Captured pre-state or claimed post-state disagrees with recomputation.
    Consistency,
    /// The storage capability failed.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Malformed => "malformed",
            Self::Unauthorized => "unauthorized",
            Self::Invariant => "invariant",
            Self::Consistency => "consistency",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed: {0}")]
    Malformed(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("consistency failure: {0}")]
    Consistency(String),
    #[error("storage: {0:#}")]
    Storage(#[from] anyhow::Error),
    #[error(transparent)]
    Object(#[from] ObjectError),
    #[error(transparent)]
    Condition(#[from] ConditionError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed(_) | Self::Condition(_) => ErrorKind::Malformed,
            Self::Object(ObjectError::Decode(_)) => ErrorKind::Malformed,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Invariant(_) | Self::Object(_) => ErrorKind::Invariant,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub(crate) fn malformed(reason: impl Into<String>) -> EngineError {
    EngineError::Malformed(reason.into())
}

pub(crate) fn unauthorized(reason: impl Into<String>) -> EngineError {
    EngineError::Unauthorized(reason.into())
}

pub(crate) fn invariant(reason: impl Into<String>) -> EngineError {
    EngineError::Invariant(reason.into())
}

pub(crate) fn consistency(reason: impl Into<String>) -> EngineError {
    EngineError::Consistency(reason.into())
}

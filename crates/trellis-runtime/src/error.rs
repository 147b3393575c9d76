//! Errors reported by part service operations.

use thiserror::Error;
use trellis_model::{ElementId, ModelError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkbenchError {
    /// The target is missing, of the wrong kind, or not reachable from a window.
    #[error("invalid argument {element}: {reason}")]
    InvalidArgument {
        element: ElementId,
        reason: &'static str,
    },
    #[error("the workbench has no window to operate on")]
    NoActiveWindow,
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl WorkbenchError {
    pub(crate) const fn invalid(element: ElementId, reason: &'static str) -> Self {
        Self::InvalidArgument { element, reason }
    }
}

pub type Result<T> = std::result::Result<T, WorkbenchError>;

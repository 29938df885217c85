use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// The ten error kinds shared by every crate in the workspace.
///
/// Every service in this workspace returns this enum rather than inventing
/// a crate-local error type; crate-local context is added via the string
/// payload or a wrapped source, never a new variant.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("aborted, caller may retry: {0}")]
    Aborted(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("canceled: {0}")]
    Canceled(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Whether the Orchestrator may retry this error internally without
    /// surfacing it to the caller (propagation policy).
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, LedgerError::Aborted(_))
    }
}

//! Lifecycle error types.

use thiserror::Error;

/// Errors that can surface from a lifecycle entry point.
///
/// Scheduled callers log these and end the invocation; nothing here is fatal
/// to the process.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Store failure.
    #[error(transparent)]
    Database(#[from] database::DatabaseError),

    /// Notification persistence failure.
    #[error(transparent)]
    Notifier(#[from] notifier::NotifierError),
}

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

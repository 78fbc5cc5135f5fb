//! Notifier error types.

use thiserror::Error;

/// Errors that can occur while dispatching notifications.
///
/// Only record persistence can fail a dispatch. Push delivery problems are
/// annotated onto the stored record and never surface here.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Record persistence failure.
    #[error(transparent)]
    Database(#[from] database::DatabaseError),
}

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, NotifierError>;

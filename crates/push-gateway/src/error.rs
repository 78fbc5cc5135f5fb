//! Push gateway error types.

use thiserror::Error;

/// Errors that can occur during push delivery.
#[derive(Debug, Error)]
pub enum PushError {
    /// Transport-level failure talking to the gateway.
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The gateway accepted the request but rejected the delivery.
    #[error("delivery rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Injected failure (mock gateway only).
    #[error("delivery failed: {0}")]
    Failed(String),
}

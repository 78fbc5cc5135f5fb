//! The PushGateway trait definition.

use async_trait::async_trait;

use crate::error::PushError;
use crate::message::PushMessage;

/// A trait for delivering push messages to devices.
///
/// Implementations range from the HTTP relay used in production to the
/// recording mock used in tests. This trait is object-safe and is used as
/// `Arc<dyn PushGateway>` throughout the workspace.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Deliver a push message.
    ///
    /// Returns the gateway-assigned delivery id on success.
    async fn send(&self, message: PushMessage) -> Result<String, PushError>;

    /// Get a human-readable name for this gateway implementation.
    fn name(&self) -> &str;
}

//! Push delivery gateway for Atelier.
//!
//! This crate defines the [`PushGateway`] trait plus the production HTTP
//! relay client and a recording mock for tests.
//!
//! # Example
//!
//! ```no_run
//! use push_gateway::{HttpGateway, PushGateway, PushMessage};
//!
//! # async fn example() -> Result<(), push_gateway::PushError> {
//! let gateway = HttpGateway::new("https://push.example.com/v1/send", None);
//! let message = PushMessage::new("device-token", "Session Tomorrow!", "Doors at 6 PM")
//!     .with_data("kind", "session_reminder");
//! let delivery_id = gateway.send(message).await?;
//! # let _ = delivery_id;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod message;
pub mod mock;
pub mod trait_def;

pub use error::PushError;
pub use http::HttpGateway;
pub use message::{AndroidHints, ApnsHints, PushMessage};
pub use mock::MockGateway;
pub use trait_def::PushGateway;

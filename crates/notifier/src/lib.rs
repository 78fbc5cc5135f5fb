//! Notification fanout for Atelier.
//!
//! The [`NotificationDispatcher`] persists one notification record per target
//! user and then, governed by the [`PreferenceGate`], attempts a push send and
//! records its outcome. Record creation and push delivery are independent:
//! push failure never rolls back or retries the record.

pub mod dispatcher;
pub mod error;
pub mod gate;

pub use dispatcher::{NotificationDispatcher, NotificationDraft};
pub use error::{NotifierError, Result};
pub use gate::PreferenceGate;

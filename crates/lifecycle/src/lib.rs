//! Weekly session lifecycle for Atelier.
//!
//! This crate is the core of the weekly cycle: the [`SessionLifecycle`]
//! state machine (create, remind, close, announce), the pure vote tally in
//! [`voting`], and the reactive trigger handlers that turn session document
//! changes into notification fanout.
//!
//! Every entry point tolerates "nothing to do" as a logged no-op: scheduled
//! triggers re-fire on their own cadence and nothing here is allowed to be
//! process-fatal.

pub mod calendar;
pub mod error;
#[allow(clippy::module_inception)]
pub mod lifecycle;
pub mod policy;
pub mod triggers;
pub mod voting;

pub use calendar::SessionCalendar;
pub use error::{LifecycleError, Result};
pub use lifecycle::SessionLifecycle;
pub use policy::{LifecycleConfig, ReminderAudience};
pub use voting::{tally, Category, CategoryWinners, WinnerBoard};

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Utc;
    use database::{user, Database, UserRole, UserStatus};
    use notifier::NotificationDispatcher;
    use push_gateway::MockGateway;

    use crate::calendar::SessionCalendar;
    use crate::lifecycle::SessionLifecycle;
    use crate::policy::LifecycleConfig;

    pub(crate) async fn test_lifecycle() -> (Database, Arc<MockGateway>, SessionLifecycle) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let gateway = Arc::new(MockGateway::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(db.clone(), gateway.clone()));
        let lifecycle = SessionLifecycle::new(
            db.clone(),
            dispatcher,
            SessionCalendar::default(),
            LifecycleConfig::default(),
        );
        (db, gateway, lifecycle)
    }

    pub(crate) async fn seed_user(db: &Database, id: &str, role: Option<UserRole>) {
        let record = database::User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: id.to_string(),
            status: UserStatus::Approved,
            is_admin: false,
            role,
            push_token: Some(format!("tok-{id}")),
            notification_preferences: HashMap::new(),
            created_at: Utc::now(),
        };
        user::create_user(db.pool(), &record).await.unwrap();
    }
}

//! Notification dispatcher: persist records, then attempt pushes.

use std::sync::Arc;

use tracing::{debug, info, warn};

use database::{
    notification, user, Database, Notification, NotificationKind, NotificationPlacement,
};
use push_gateway::{PushGateway, PushMessage};

use crate::error::Result;
use crate::gate::PreferenceGate;

/// One notification to be created for one target user.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

impl NotificationDraft {
    pub fn new(
        user_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        data: serde_json::Value,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            kind,
            title: title.to_string(),
            message: message.to_string(),
            data,
        }
    }
}

/// Persists notification records and forwards them to the push gateway.
///
/// Record creation and push delivery are deliberately decoupled: the record
/// always lands (batches atomically), while a failed push is caught, logged,
/// and annotated onto the record. Pushes are never retried.
pub struct NotificationDispatcher {
    db: Database,
    gateway: Arc<dyn PushGateway>,
}

impl NotificationDispatcher {
    pub fn new(db: Database, gateway: Arc<dyn PushGateway>) -> Self {
        Self { db, gateway }
    }

    /// Persist a batch of notifications atomically, then attempt a push for
    /// each. Returns the number of records created.
    pub async fn dispatch_batch(
        &self,
        drafts: Vec<NotificationDraft>,
        placement: NotificationPlacement,
    ) -> Result<usize> {
        if drafts.is_empty() {
            return Ok(0);
        }

        let records: Vec<Notification> = drafts
            .iter()
            .map(|d| {
                notification::new_notification(&d.user_id, d.kind, &d.title, &d.message, d.data.clone())
            })
            .collect();

        notification::insert_batch(self.db.pool(), placement, &records).await?;
        info!(count = records.len(), kind = %records[0].kind, "Created notification batch");

        for record in &records {
            self.deliver_push(record, placement).await;
        }

        Ok(records.len())
    }

    /// Persist a single notification, then attempt its push.
    pub async fn dispatch_one(
        &self,
        draft: NotificationDraft,
        placement: NotificationPlacement,
    ) -> Result<Notification> {
        let record = notification::new_notification(
            &draft.user_id,
            draft.kind,
            &draft.title,
            &draft.message,
            draft.data,
        );

        notification::insert_one(self.db.pool(), placement, &record).await?;
        info!(user_id = %record.user_id, kind = %record.kind, "Created notification");

        self.deliver_push(&record, placement).await;

        Ok(record)
    }

    /// Attempt push delivery for a stored record.
    ///
    /// The user is re-fetched here so that a preference flipped after record
    /// creation still gates the not-yet-delivered push. Every failure mode is
    /// terminal for this record: logged, annotated where possible, never
    /// propagated and never retried.
    async fn deliver_push(&self, record: &Notification, placement: NotificationPlacement) {
        let user = match user::find_user(self.db.pool(), &record.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(user_id = %record.user_id, "Push target user not found, skipping");
                return;
            }
            Err(err) => {
                warn!(user_id = %record.user_id, error = %err, "Failed to load push target");
                return;
            }
        };

        if !PreferenceGate::should_push(&user, record.kind) {
            info!(user_id = %user.id, kind = %record.kind, "Push disabled by preference, skipping");
            return;
        }

        let Some(token) = user.push_token.as_deref() else {
            debug!(user_id = %user.id, "No push token registered, skipping push");
            return;
        };

        let mut message = PushMessage::new(token, &record.title, &record.message)
            .with_data("notification_id", &record.id)
            .with_data("kind", record.kind.as_str())
            .with_data("user_id", &record.user_id);

        if let Some(extra) = record.data.as_object() {
            for (key, value) in extra {
                let rendered = match value.as_str() {
                    Some(s) => s.to_string(),
                    None => value.to_string(),
                };
                message = message.with_data(key, &rendered);
            }
        }

        match self.gateway.send(message).await {
            Ok(delivery_id) => {
                info!(user_id = %user.id, delivery_id = %delivery_id, "Push delivered");
                if let Err(err) =
                    notification::mark_push_sent(self.db.pool(), placement, &record.id, &delivery_id)
                        .await
                {
                    warn!(id = %record.id, error = %err, "Failed to record push success");
                }
            }
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "Push delivery failed");
                if let Err(err) = notification::mark_push_failed(
                    self.db.pool(),
                    placement,
                    &record.id,
                    &err.to_string(),
                )
                .await
                {
                    warn!(id = %record.id, error = %err, "Failed to record push failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use database::UserStatus;
    use push_gateway::MockGateway;
    use std::collections::HashMap;

    async fn test_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    async fn seed_user(db: &Database, id: &str, prefs: HashMap<String, bool>, token: Option<&str>) {
        let record = database::User {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            name: id.to_string(),
            status: UserStatus::Approved,
            is_admin: false,
            role: None,
            push_token: token.map(str::to_string),
            notification_preferences: prefs,
            created_at: Utc::now(),
        };
        user::create_user(db.pool(), &record).await.unwrap();
    }

    fn draft(user_id: &str, kind: NotificationKind) -> NotificationDraft {
        NotificationDraft::new(user_id, kind, "Title", "Body", serde_json::json!({}))
    }

    #[tokio::test]
    async fn record_created_even_when_push_gated_off() {
        let db = test_db().await;
        let gateway = Arc::new(MockGateway::new());
        seed_user(
            &db,
            "u1",
            HashMap::from([("voting_reminder".to_string(), false)]),
            Some("tok-u1"),
        )
        .await;

        let dispatcher = NotificationDispatcher::new(db.clone(), gateway.clone());
        dispatcher
            .dispatch_one(draft("u1", NotificationKind::VotingReminder), NotificationPlacement::Inbox)
            .await
            .unwrap();

        // Stored record exists, push was gated off
        let stored = notification::list_for_user(db.pool(), NotificationPlacement::Inbox, "u1")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(gateway.sent_count().await, 0);
        assert_eq!(stored[0].push_sent, None);
    }

    #[tokio::test]
    async fn push_failure_is_annotated_not_raised() {
        let db = test_db().await;
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_token("tok-u1").await;
        seed_user(&db, "u1", HashMap::new(), Some("tok-u1")).await;

        let dispatcher = NotificationDispatcher::new(db.clone(), gateway.clone());
        dispatcher
            .dispatch_one(draft("u1", NotificationKind::SessionReminder), NotificationPlacement::Feed)
            .await
            .unwrap();

        let stored = notification::list_for_user(db.pool(), NotificationPlacement::Feed, "u1")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].push_error.as_deref().unwrap().contains("injected"));
        assert!(stored[0].push_error_at.is_some());
        assert_eq!(stored[0].push_sent, None);
    }

    #[tokio::test]
    async fn batch_creates_all_records_and_pushes_where_possible() {
        let db = test_db().await;
        let gateway = Arc::new(MockGateway::new());
        seed_user(&db, "a", HashMap::new(), Some("tok-a")).await;
        seed_user(&db, "b", HashMap::new(), None).await; // no token
        seed_user(&db, "c", HashMap::new(), Some("tok-c")).await;

        let dispatcher = NotificationDispatcher::new(db.clone(), gateway.clone());
        let created = dispatcher
            .dispatch_batch(
                vec![
                    draft("a", NotificationKind::SessionCreated),
                    draft("b", NotificationKind::SessionCreated),
                    draft("c", NotificationKind::SessionCreated),
                    draft("missing-user", NotificationKind::SessionCreated),
                ],
                NotificationPlacement::Feed,
            )
            .await
            .unwrap();

        assert_eq!(created, 4);
        assert_eq!(
            notification::count_all(db.pool(), NotificationPlacement::Feed).await.unwrap(),
            4
        );
        // Pushes only for users that exist and carry a token
        assert_eq!(gateway.sent_count().await, 2);

        let sent = notification::list_for_user(db.pool(), NotificationPlacement::Feed, "a")
            .await
            .unwrap();
        assert_eq!(sent[0].push_sent, Some(true));
        assert!(sent[0].push_message_id.is_some());
    }

    #[tokio::test]
    async fn push_payload_carries_record_metadata() {
        let db = test_db().await;
        let gateway = Arc::new(MockGateway::new());
        seed_user(&db, "a", HashMap::new(), Some("tok-a")).await;

        let dispatcher = NotificationDispatcher::new(db.clone(), gateway.clone());
        dispatcher
            .dispatch_one(
                NotificationDraft::new(
                    "a",
                    NotificationKind::NewSubmission,
                    "New Portrait Submission!",
                    "A new portrait was submitted.",
                    serde_json::json!({"submission_id": "s-9", "count": 3}),
                ),
                NotificationPlacement::Feed,
            )
            .await
            .unwrap();

        let sent = gateway.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data.get("kind").map(String::as_str), Some("new_submission"));
        assert_eq!(sent[0].data.get("submission_id").map(String::as_str), Some("s-9"));
        assert_eq!(sent[0].data.get("count").map(String::as_str), Some("3"));
    }
}

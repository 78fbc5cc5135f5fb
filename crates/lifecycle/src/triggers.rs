//! Reactive trigger handlers.
//!
//! These run on session document changes, fed with before/after snapshots by
//! whatever observed the mutation. A missing snapshot on either side is a
//! normal immediate return, never an error.

use serde_json::json;
use tracing::{debug, info, warn};

use database::{user, NotificationKind, NotificationPlacement, WeeklySession, WeeklySubmission};
use notifier::NotificationDraft;

use crate::error::Result;
use crate::lifecycle::SessionLifecycle;

impl SessionLifecycle {
    /// React to a session document update: RSVP confirmations for newly
    /// added RSVPs, and fanout for newly appended submissions.
    pub async fn handle_session_update(
        &self,
        before: Option<&WeeklySession>,
        after: Option<&WeeklySession>,
    ) -> Result<()> {
        let (Some(before), Some(after)) = (before, after) else {
            debug!("Session update missing a snapshot, ignoring");
            return Ok(());
        };

        self.confirm_new_rsvps(before, after).await?;
        self.announce_new_submissions(before, after).await?;

        Ok(())
    }

    /// Send a confirmation to each user present in `after`'s RSVP list but
    /// not `before`'s, in arrival order. Reordering without additions
    /// produces nothing.
    async fn confirm_new_rsvps(
        &self,
        before: &WeeklySession,
        after: &WeeklySession,
    ) -> Result<()> {
        let new_rsvps: Vec<&String> = after
            .rsvp_user_ids
            .iter()
            .filter(|id| !before.rsvp_user_ids.contains(id))
            .collect();

        if new_rsvps.is_empty() {
            return Ok(());
        }

        info!(count = new_rsvps.len(), "New RSVPs detected");
        let date_text = self.calendar().display_date(after.session_date);

        for user_id in new_rsvps {
            // A vanished user record is a silent skip, and one user's
            // failure never blocks the rest.
            match user::find_user(self.db().pool(), user_id).await {
                Ok(Some(user)) => {
                    let draft = NotificationDraft::new(
                        &user.id,
                        NotificationKind::RsvpConfirmation,
                        "RSVP Confirmed!",
                        &format!(
                            "You're confirmed for the weekly session on {date_text}. See you there!"
                        ),
                        json!({ "session_date": after.session_date.to_rfc3339() }),
                    );
                    if let Err(err) = self
                        .dispatcher()
                        .dispatch_one(draft, NotificationPlacement::Feed)
                        .await
                    {
                        warn!(user_id = %user.id, error = %err, "RSVP confirmation failed");
                    }
                }
                Ok(None) => {
                    debug!(user_id = %user_id, "RSVP user record gone, skipping confirmation");
                }
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "Failed to load RSVP user");
                }
            }
        }

        Ok(())
    }

    /// Notify RSVP'd participants about each submission present in `after`
    /// but not `before`, compared by submission id.
    ///
    /// Single-append is the common case, but a snapshot pair can carry any
    /// number of new submissions; each is handled the same way.
    async fn announce_new_submissions(
        &self,
        before: &WeeklySession,
        after: &WeeklySession,
    ) -> Result<()> {
        let known: std::collections::HashSet<&str> =
            before.submissions.iter().map(|s| s.id.as_str()).collect();
        let new_submissions: Vec<&WeeklySubmission> = after
            .submissions
            .iter()
            .filter(|s| !known.contains(s.id.as_str()))
            .collect();

        for submission in new_submissions {
            info!(
                submission_id = %submission.id,
                user_id = %submission.user_id,
                "New submission detected"
            );

            let drafts: Vec<NotificationDraft> = after
                .rsvp_user_ids
                .iter()
                .filter(|id| **id != submission.user_id)
                .map(|id| {
                    NotificationDraft::new(
                        id,
                        NotificationKind::NewSubmission,
                        "New Portrait Submission!",
                        &format!(
                            "A new portrait \"{}\" has been submitted to the weekly session.",
                            submission.portrait_title
                        ),
                        json!({
                            "submission_id": submission.id,
                            "portrait_title": submission.portrait_title,
                        }),
                    )
                })
                .collect();

            if let Err(err) = self
                .dispatcher()
                .dispatch_batch(drafts, NotificationPlacement::Feed)
                .await
            {
                warn!(submission_id = %submission.id, error = %err, "Submission fanout failed");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{seed_user, test_lifecycle};
    use chrono::{TimeZone, Utc};
    use database::{notification, session};

    fn monday() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 17, 22, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn missing_snapshots_are_ignored() {
        let (db, gateway, lifecycle) = test_lifecycle().await;
        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();

        lifecycle.handle_session_update(None, Some(&created)).await.unwrap();
        lifecycle.handle_session_update(Some(&created), None).await.unwrap();
        lifecycle.handle_session_update(None, None).await.unwrap();

        assert_eq!(gateway.sent_count().await, 0);
    }

    #[tokio::test]
    async fn only_the_new_rsvp_gets_a_confirmation() {
        let (db, _gateway, lifecycle) = test_lifecycle().await;
        for id in ["a", "b", "c"] {
            seed_user(&db, id, None).await;
        }

        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();
        session::add_rsvp(db.pool(), &created.id, "a").await.unwrap();
        let update = {
            session::add_rsvp(db.pool(), &created.id, "b").await.unwrap();
            session::add_rsvp(db.pool(), &created.id, "c").await.unwrap()
        };

        // before = [a, b], after = [a, b, c]
        lifecycle
            .handle_session_update(Some(&update.before), Some(&update.after))
            .await
            .unwrap();

        let c_feed = notification::list_for_user(db.pool(), database::NotificationPlacement::Feed, "c")
            .await
            .unwrap();
        assert_eq!(c_feed.len(), 1);
        assert_eq!(c_feed[0].kind, NotificationKind::RsvpConfirmation);

        for id in ["a", "b"] {
            let feed = notification::list_for_user(db.pool(), database::NotificationPlacement::Feed, id)
                .await
                .unwrap();
            assert!(feed.is_empty());
        }
    }

    #[tokio::test]
    async fn reordering_rsvps_confirms_nobody() {
        let (db, gateway, lifecycle) = test_lifecycle().await;
        for id in ["a", "b"] {
            seed_user(&db, id, None).await;
        }

        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();
        session::add_rsvp(db.pool(), &created.id, "a").await.unwrap();
        let update = session::add_rsvp(db.pool(), &created.id, "b").await.unwrap();

        let mut reordered = update.after.clone();
        reordered.rsvp_user_ids.reverse();

        lifecycle
            .handle_session_update(Some(&update.after), Some(&reordered))
            .await
            .unwrap();

        assert_eq!(
            notification::count_all(db.pool(), database::NotificationPlacement::Feed)
                .await
                .unwrap(),
            0
        );
        assert_eq!(gateway.sent_count().await, 0);
    }

    #[tokio::test]
    async fn vanished_rsvp_user_is_skipped_silently() {
        let (db, _gateway, lifecycle) = test_lifecycle().await;

        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();
        let update = session::add_rsvp(db.pool(), &created.id, "ghost").await.unwrap();

        lifecycle
            .handle_session_update(Some(&update.before), Some(&update.after))
            .await
            .unwrap();

        assert_eq!(
            notification::count_all(db.pool(), database::NotificationPlacement::Feed)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn submission_fanout_excludes_the_submitter() {
        let (db, _gateway, lifecycle) = test_lifecycle().await;
        for id in ["artist", "fan1", "fan2"] {
            seed_user(&db, id, None).await;
        }

        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();
        for id in ["artist", "fan1", "fan2"] {
            session::add_rsvp(db.pool(), &created.id, id).await.unwrap();
        }

        let update = session::append_submission(
            db.pool(),
            &created.id,
            "artist",
            "p1",
            "Morning Study",
            "https://img.example/p1.jpg",
            None,
        )
        .await
        .unwrap();

        lifecycle
            .handle_session_update(Some(&update.before), Some(&update.after))
            .await
            .unwrap();

        for id in ["fan1", "fan2"] {
            let feed = notification::list_for_user(db.pool(), database::NotificationPlacement::Feed, id)
                .await
                .unwrap();
            assert_eq!(feed.len(), 1);
            assert_eq!(feed[0].kind, NotificationKind::NewSubmission);
            assert!(feed[0].message.contains("Morning Study"));
        }

        let artist_feed =
            notification::list_for_user(db.pool(), database::NotificationPlacement::Feed, "artist")
                .await
                .unwrap();
        assert!(artist_feed.is_empty());
    }

    #[tokio::test]
    async fn multiple_appends_between_snapshots_all_fan_out() {
        let (db, _gateway, lifecycle) = test_lifecycle().await;
        for id in ["artist", "fan"] {
            seed_user(&db, id, None).await;
        }

        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();
        for id in ["artist", "fan"] {
            session::add_rsvp(db.pool(), &created.id, id).await.unwrap();
        }

        let first = session::append_submission(
            db.pool(),
            &created.id,
            "artist",
            "p1",
            "First",
            "https://img.example/p1.jpg",
            None,
        )
        .await
        .unwrap();
        let second = session::append_submission(
            db.pool(),
            &created.id,
            "artist",
            "p2",
            "Second",
            "https://img.example/p2.jpg",
            None,
        )
        .await
        .unwrap();

        // Snapshot pair spanning both appends: both submissions are new
        lifecycle
            .handle_session_update(Some(&first.before), Some(&second.after))
            .await
            .unwrap();

        let fan_feed =
            notification::list_for_user(db.pool(), database::NotificationPlacement::Feed, "fan")
                .await
                .unwrap();
        assert_eq!(fan_feed.len(), 2);
    }

    #[tokio::test]
    async fn unchanged_submissions_fan_out_nothing() {
        let (db, gateway, lifecycle) = test_lifecycle().await;
        seed_user(&db, "artist", None).await;

        let created = session::insert_session(db.pool(), monday(), None, None).await.unwrap();
        session::add_rsvp(db.pool(), &created.id, "artist").await.unwrap();
        let update = session::append_submission(
            db.pool(),
            &created.id,
            "artist",
            "p1",
            "First",
            "https://img.example/p1.jpg",
            None,
        )
        .await
        .unwrap();

        // Same snapshot on both sides: no diff
        lifecycle
            .handle_session_update(Some(&update.after), Some(&update.after))
            .await
            .unwrap();

        assert_eq!(gateway.sent_count().await, 0);
    }
}

//! The weekly session state machine.
//!
//! Each weekly cycle moves `NONE -> ACTIVE -> CLOSED`, keyed by the
//! normalized session date. Every entry point here is invoked by a scheduler
//! that may re-fire a slot, so creation and closure claim an idempotency slot
//! before mutating, and "no matching session" is always a logged no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use database::{
    model_pool, session, trigger_claim, user, Database, NotificationKind, NotificationPlacement,
    SessionResults, User, WeeklySession,
};
use notifier::{NotificationDispatcher, NotificationDraft};

use crate::calendar::SessionCalendar;
use crate::error::Result;
use crate::policy::{LifecycleConfig, ReminderAudience};
use crate::voting;

const CLAIM_CREATE: &str = "session_create";
const CLAIM_CLOSE: &str = "session_close";

/// Coordinates session creation, reminders, closure, and winner announcement.
pub struct SessionLifecycle {
    db: Database,
    dispatcher: Arc<NotificationDispatcher>,
    calendar: SessionCalendar,
    config: LifecycleConfig,
}

impl SessionLifecycle {
    pub fn new(
        db: Database,
        dispatcher: Arc<NotificationDispatcher>,
        calendar: SessionCalendar,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            db,
            dispatcher,
            calendar,
            config,
        }
    }

    pub(crate) fn db(&self) -> &Database {
        &self.db
    }

    pub(crate) fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn calendar(&self) -> &SessionCalendar {
        &self.calendar
    }

    /// Open the weekly session for `target_date`.
    ///
    /// No-ops (returning `None`) when this slot was already claimed or an
    /// active session already exists for the date. The query-then-act check
    /// accepts the race window between overlapping invocations; the
    /// idempotency claim covers the common retry case.
    pub async fn create_session(
        &self,
        target_date: DateTime<Utc>,
    ) -> Result<Option<WeeklySession>> {
        if !trigger_claim::claim(self.db.pool(), CLAIM_CREATE, target_date).await? {
            info!(date = %target_date, "Session creation already triggered for this date");
            return Ok(None);
        }

        // The claim marks the mutation as done; if the insert never lands,
        // hand the slot back so the scheduler's retry is not a silent no-op.
        let created = match self.open_session(target_date).await {
            Ok(Some(created)) => created,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.release_claim(CLAIM_CREATE, target_date).await;
                return Err(err);
            }
        };
        info!(session_id = %created.id, date = %target_date, "Created weekly session");

        let approved = user::list_approved_users(self.db.pool()).await?;
        let date_text = self.calendar.display_date(target_date);
        let model_info = created
            .model_name
            .as_deref()
            .map(|name| format!(" with model {name}"))
            .unwrap_or_default();

        let drafts = approved
            .iter()
            .map(|u| {
                NotificationDraft::new(
                    &u.id,
                    NotificationKind::SessionCreated,
                    "New Weekly Session Created!",
                    &format!(
                        "A new weekly session has been scheduled for {date_text}{model_info}."
                    ),
                    json!({ "session_date": target_date.to_rfc3339() }),
                )
            })
            .collect();

        if let Err(err) = self
            .dispatcher
            .dispatch_batch(drafts, NotificationPlacement::Feed)
            .await
        {
            warn!(error = %err, "Session creation notifications failed");
        }

        Ok(Some(created))
    }

    /// Insert the week's session row, skipping when one is already active.
    async fn open_session(&self, target_date: DateTime<Utc>) -> Result<Option<WeeklySession>> {
        if let Some(existing) = session::find_active_by_date(self.db.pool(), target_date).await? {
            warn!(session_id = %existing.id, "Active session already exists, not creating");
            return Ok(None);
        }

        // A missing or failed model lookup never blocks creation; an admin
        // can assign one later.
        let model = match model_pool::find_for_date(self.db.pool(), target_date).await {
            Ok(Some(model)) => {
                info!(model = %model.name, "Found model for session");
                Some(model)
            }
            Ok(None) => {
                info!("No model found for this session date");
                None
            }
            Err(err) => {
                warn!(error = %err, "Model lookup failed, continuing without model");
                None
            }
        };

        let (model_name, model_image_url) = match model {
            Some(m) => (Some(m.name), m.image_url),
            None => (None, None),
        };

        let created =
            session::insert_session(self.db.pool(), target_date, model_name, model_image_url)
                .await?;
        Ok(Some(created))
    }

    async fn release_claim(&self, kind: &str, target_date: DateTime<Utc>) {
        if let Err(err) = trigger_claim::release(self.db.pool(), kind, target_date).await {
            warn!(kind, date = %target_date, error = %err, "Failed to release trigger claim");
        }
    }

    /// Remind the configured audience about the session for `target_date`.
    ///
    /// Returns the number of reminders created; zero with no active session.
    pub async fn send_session_reminders(&self, target_date: DateTime<Utc>) -> Result<usize> {
        let Some(active) = session::find_active_by_date(self.db.pool(), target_date).await? else {
            info!(date = %target_date, "No active session found, skipping reminders");
            return Ok(0);
        };

        let approved = user::list_approved_users(self.db.pool()).await?;
        let audience: Vec<&User> = match self.config.session_reminder_audience {
            ReminderAudience::AllApproved => approved.iter().collect(),
            ReminderAudience::NotYetActed => approved
                .iter()
                .filter(|u| !active.rsvp_user_ids.contains(&u.id))
                .collect(),
        };

        let date_text = self.calendar.display_date(target_date);
        let model_info = active
            .model_name
            .as_deref()
            .map(|name| format!(" with model {name}"))
            .unwrap_or_default();

        let drafts = audience
            .iter()
            .map(|u| {
                NotificationDraft::new(
                    &u.id,
                    NotificationKind::SessionReminder,
                    "Weekly Session Tomorrow!",
                    &format!(
                        "Don't forget! The weekly session on {date_text} starts tomorrow{model_info}."
                    ),
                    json!({ "session_date": target_date.to_rfc3339() }),
                )
            })
            .collect();

        let sent = self
            .dispatcher
            .dispatch_batch(drafts, NotificationPlacement::Feed)
            .await?;
        info!(count = sent, "Sent session reminders");

        Ok(sent)
    }

    /// Close the session for `target_date`, compute results, and notify
    /// RSVP'd participants.
    pub async fn close_session(
        &self,
        target_date: DateTime<Utc>,
    ) -> Result<Option<SessionResults>> {
        if !trigger_claim::claim(self.db.pool(), CLAIM_CLOSE, target_date).await? {
            info!(date = %target_date, "Session closure already triggered for this date");
            return Ok(None);
        }

        // As with creation, the claim only sticks once the flip landed.
        let active = match self.flip_closed(target_date).await {
            Ok(Some(active)) => active,
            Ok(None) => return Ok(None),
            Err(err) => {
                self.release_claim(CLAIM_CLOSE, target_date).await;
                return Err(err);
            }
        };

        let results = compute_results(
            active.rsvp_user_ids.len(),
            active.submissions.len(),
            Utc::now(),
        );
        session::set_results(self.db.pool(), &active.id, &results).await?;
        info!(
            session_id = %active.id,
            submissions = results.total_submissions,
            participants = results.total_participants,
            rate = results.participation_rate,
            "Processed session results"
        );

        let drafts = active
            .rsvp_user_ids
            .iter()
            .map(|user_id| {
                NotificationDraft::new(
                    user_id,
                    NotificationKind::SessionCompleted,
                    "Weekly Session Completed!",
                    "The weekly session has ended. Check out all the portraits submitted!",
                    json!({
                        "session_id": active.id,
                        "total_submissions": active.submissions.len(),
                    }),
                )
            })
            .collect();

        if let Err(err) = self
            .dispatcher
            .dispatch_batch(drafts, NotificationPlacement::Feed)
            .await
        {
            warn!(error = %err, "Session completion notifications failed");
        }

        Ok(Some(results))
    }

    /// Flip the date's active session to closed, reporting the session that
    /// was flipped. `None` when there is nothing to close or a concurrent
    /// closure got there first.
    async fn flip_closed(&self, target_date: DateTime<Utc>) -> Result<Option<WeeklySession>> {
        let Some(active) = session::find_active_by_date(self.db.pool(), target_date).await? else {
            info!(date = %target_date, "No active session found to close");
            return Ok(None);
        };

        if !session::close_session(self.db.pool(), &active.id, Utc::now()).await? {
            info!(session_id = %active.id, "Session was already closed");
            return Ok(None);
        }

        Ok(Some(active))
    }

    /// Nudge artists to vote on the session for `target_date`.
    ///
    /// Voting stays open after the session itself closes, so the lookup is
    /// by date alone rather than on the active flag. Reminders go to the
    /// per-user inbox, one write per artist, with each artist's failure
    /// isolated from the rest.
    pub async fn send_voting_reminders(&self, target_date: DateTime<Utc>) -> Result<usize> {
        let Some(week) = session::find_by_date(self.db.pool(), target_date).await? else {
            info!(date = %target_date, "No session found, skipping voting reminders");
            return Ok(0);
        };

        let artists = user::list_approved_artists(self.db.pool()).await?;
        let audience: Vec<&User> = match self.config.voting_reminder_audience {
            ReminderAudience::AllApproved => artists.iter().collect(),
            ReminderAudience::NotYetActed => artists
                .iter()
                .filter(|artist| !has_voted(&week, &artist.id))
                .collect(),
        };

        let session_title = format!(
            "Weekly Session - {}",
            self.calendar.display_date(target_date)
        );

        let mut sent = 0;
        for artist in audience {
            let draft = NotificationDraft::new(
                &artist.id,
                NotificationKind::VotingReminder,
                "\u{1F5F3}\u{FE0F} Cast Your Votes!",
                "Don't forget to vote for your favorite portraits! Voting closes Friday at noon.",
                json!({ "session_title": session_title, "action": "voting_reminder" }),
            );

            match self
                .dispatcher
                .dispatch_one(draft, NotificationPlacement::Inbox)
                .await
            {
                Ok(_) => sent += 1,
                Err(err) => {
                    warn!(artist_id = %artist.id, error = %err, "Voting reminder failed");
                }
            }
        }

        info!(count = sent, "Sent voting reminders");
        Ok(sent)
    }

    /// Announce per-category winners for the most recent session.
    ///
    /// Winners get a personal notification (with tie handling); every other
    /// approved artist gets the general announcement. Returns the number of
    /// notifications created.
    pub async fn announce_winners(&self, now: DateTime<Utc>) -> Result<usize> {
        let Some(latest) = session::find_latest_before(self.db.pool(), now).await? else {
            info!("No sessions found for winner announcements");
            return Ok(0);
        };

        if latest.submissions.is_empty() {
            info!(session_id = %latest.id, "No submissions for this session");
            return Ok(0);
        }

        let board = voting::tally(&latest.submissions);
        info!(
            categories = board.categories.len(),
            winners = board.all_winner_ids.len(),
            "Tallied winners"
        );

        let mut created = 0;

        for (category, winners) in &board.categories {
            let title = if winners.is_tie() {
                "\u{1F3C6} You're a Co-Winner!"
            } else {
                "\u{1F3C6} Congratulations, You Won!"
            };
            let tie_suffix = if winners.is_tie() {
                format!(" ({}-way tie)", winners.tie_count())
            } else {
                String::new()
            };
            let body = format!("You won {}!{}", category.display_name(), tie_suffix);

            for winner_id in &winners.user_ids {
                let draft = NotificationDraft::new(
                    winner_id,
                    NotificationKind::WinnerAnnouncement,
                    title,
                    &body,
                    json!({
                        "session_id": latest.id,
                        "category": category.key(),
                        "tie": winners.is_tie(),
                        "tie_count": winners.tie_count(),
                    }),
                );

                match self
                    .dispatcher
                    .dispatch_one(draft, NotificationPlacement::Feed)
                    .await
                {
                    Ok(_) => created += 1,
                    Err(err) => {
                        warn!(winner_id = %winner_id, error = %err, "Winner notification failed");
                    }
                }
            }
        }

        // General announcement, skipping artists who already got a personal one.
        let artists = user::list_approved_artists(self.db.pool()).await?;
        let drafts: Vec<NotificationDraft> = artists
            .iter()
            .filter(|artist| !board.all_winner_ids.contains(&artist.id))
            .map(|artist| {
                NotificationDraft::new(
                    &artist.id,
                    NotificationKind::WinnersAnnounced,
                    "\u{1F3C6} This Week's Winners Announced!",
                    "Check out who won this week's awards.",
                    json!({ "session_id": latest.id }),
                )
            })
            .collect();

        match self
            .dispatcher
            .dispatch_batch(drafts, NotificationPlacement::Feed)
            .await
        {
            Ok(count) => created += count,
            Err(err) => {
                warn!(error = %err, "General winner announcement failed");
            }
        }

        Ok(created)
    }
}

/// Whether a user has voted in any category of any submission.
pub(crate) fn has_voted(session: &WeeklySession, user_id: &str) -> bool {
    session.submissions.iter().any(|submission| {
        submission
            .votes
            .values()
            .any(|voters| voters.iter().any(|v| v == user_id))
    })
}

/// Participation totals for a closing session.
///
/// The rate is `round(100 * submissions / participants)` and is deliberately
/// not clamped: submissions from people who never RSVP'd push it past 100.
pub(crate) fn compute_results(
    total_participants: usize,
    total_submissions: usize,
    processed_at: DateTime<Utc>,
) -> SessionResults {
    let participation_rate = if total_participants == 0 {
        0
    } else {
        (100.0 * total_submissions as f64 / total_participants as f64).round() as i64
    };

    SessionResults {
        total_participants,
        total_submissions,
        participation_rate,
        processed_at,
    }
}

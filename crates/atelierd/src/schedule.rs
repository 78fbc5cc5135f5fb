//! Weekly schedule loop.
//!
//! Each job owns a fixed weekly slot (weekday, hour, minute) in the session
//! time zone. A job failure is logged and the loop sleeps until the next
//! occurrence; nothing here crashes the process.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{error, info};

use lifecycle::SessionLifecycle;

/// A fixed weekly wall-clock slot.
#[derive(Debug, Clone, Copy)]
pub struct WeeklySlot {
    pub weekday: Weekday,
    pub hour: u32,
    pub minute: u32,
}

impl WeeklySlot {
    pub fn new(weekday: Weekday, hour: u32, minute: u32) -> Self {
        Self {
            weekday,
            hour: hour.min(23),
            minute: minute.min(59),
        }
    }

    /// The next instant this slot fires, strictly after `now`.
    pub fn next_occurrence(&self, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
        let local = now.with_timezone(&tz);
        let days_ahead =
            (self.weekday.num_days_from_monday() as i64 - local.weekday().num_days_from_monday() as i64)
                .rem_euclid(7);

        for extra_weeks in 0..2 {
            let date = local.date_naive() + Duration::days(days_ahead + extra_weeks * 7);
            let naive = match date.and_hms_opt(self.hour, 0, 0) {
                Some(base) => base + Duration::minutes(self.minute as i64),
                None => continue,
            };
            let candidate = match tz.from_local_datetime(&naive) {
                chrono::offset::LocalResult::Single(dt) => dt.with_timezone(&Utc),
                chrono::offset::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
                chrono::offset::LocalResult::None => continue,
            };
            if candidate > now {
                return candidate;
            }
        }

        // Unreachable in practice; fire in a week as a safe fallback
        now + Duration::weeks(1)
    }
}

/// The scheduled entry points of the weekly cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    CreateSession,
    SessionReminders,
    CloseSession,
    VotingReminders,
    WinnerAnnouncements,
}

impl ScheduledJob {
    pub fn name(&self) -> &'static str {
        match self {
            ScheduledJob::CreateSession => "create_session",
            ScheduledJob::SessionReminders => "session_reminders",
            ScheduledJob::CloseSession => "close_session",
            ScheduledJob::VotingReminders => "voting_reminders",
            ScheduledJob::WinnerAnnouncements => "winner_announcements",
        }
    }
}

/// The weekly cadence, derived from the session start hour: creation at the
/// session start on Monday, reminders the evening before, closure an hour
/// after the start, voting nudges Wednesday evening, winners Friday noon.
pub fn weekly_jobs(session_hour: u32) -> Vec<(ScheduledJob, WeeklySlot)> {
    vec![
        (
            ScheduledJob::CreateSession,
            WeeklySlot::new(Weekday::Mon, session_hour, 0),
        ),
        (
            ScheduledJob::SessionReminders,
            WeeklySlot::new(Weekday::Sun, session_hour, 0),
        ),
        (
            ScheduledJob::CloseSession,
            WeeklySlot::new(Weekday::Mon, (session_hour + 1).min(23), 0),
        ),
        (
            ScheduledJob::VotingReminders,
            WeeklySlot::new(Weekday::Wed, 19, 0),
        ),
        (
            ScheduledJob::WinnerAnnouncements,
            WeeklySlot::new(Weekday::Fri, 12, 0),
        ),
    ]
}

/// Fire one job now. Every outcome is logged; errors end the invocation and
/// nothing more.
pub async fn fire(lifecycle: &SessionLifecycle, job: ScheduledJob) {
    let now = Utc::now();
    let calendar = lifecycle.calendar();

    let outcome = match job {
        ScheduledJob::CreateSession => lifecycle
            .create_session(calendar.this_monday(now))
            .await
            .map(|created| match created {
                Some(session) => format!("created session {}", session.id),
                None => "no-op".to_string(),
            }),
        ScheduledJob::SessionReminders => lifecycle
            .send_session_reminders(calendar.next_monday(now))
            .await
            .map(|count| format!("{count} reminders")),
        ScheduledJob::CloseSession => lifecycle
            .close_session(calendar.this_monday(now))
            .await
            .map(|results| match results {
                Some(results) => format!("closed, rate {}", results.participation_rate),
                None => "no-op".to_string(),
            }),
        ScheduledJob::VotingReminders => lifecycle
            .send_voting_reminders(calendar.this_monday(now))
            .await
            .map(|count| format!("{count} reminders")),
        ScheduledJob::WinnerAnnouncements => lifecycle
            .announce_winners(now)
            .await
            .map(|count| format!("{count} notifications")),
    };

    match outcome {
        Ok(summary) => info!(job = job.name(), %summary, "Scheduled job finished"),
        Err(err) => error!(job = job.name(), error = %err, "Scheduled job failed"),
    }
}

/// Spawn one loop per weekly job. Runs until the process exits.
pub fn spawn_all(lifecycle: Arc<SessionLifecycle>, tz: Tz, session_hour: u32) {
    for (job, slot) in weekly_jobs(session_hour) {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = slot.next_occurrence(now, tz);
                info!(job = job.name(), fires_at = %next, "Scheduled");

                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                fire(&lifecycle, job).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TZ: Tz = chrono_tz::America::New_York;

    #[test]
    fn next_occurrence_is_strictly_in_the_future() {
        let slot = WeeklySlot::new(Weekday::Mon, 18, 0);
        // Exactly at the slot instant: Monday 2026-08-17 18:00 EDT == 22:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 8, 17, 22, 0, 0).unwrap();
        let next = slot.next_occurrence(now, TZ);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 24, 22, 0, 0).unwrap());
    }

    #[test]
    fn same_day_earlier_hour_fires_today() {
        let slot = WeeklySlot::new(Weekday::Mon, 18, 0);
        // Monday morning
        let now = Utc.with_ymd_and_hms(2026, 8, 17, 12, 0, 0).unwrap();
        let next = slot.next_occurrence(now, TZ);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 17, 22, 0, 0).unwrap());
    }

    #[test]
    fn wraps_to_the_requested_weekday() {
        let slot = WeeklySlot::new(Weekday::Fri, 12, 0);
        // Saturday: next Friday is six days out
        let now = Utc.with_ymd_and_hms(2026, 8, 15, 0, 0, 0).unwrap();
        let next = slot.next_occurrence(now, TZ);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 8, 21, 16, 0, 0).unwrap());
    }

    #[test]
    fn derived_cadence_covers_every_job() {
        let jobs = weekly_jobs(18);
        assert_eq!(jobs.len(), 5);
        let close = jobs
            .iter()
            .find(|(job, _)| *job == ScheduledJob::CloseSession)
            .unwrap();
        assert_eq!(close.1.hour, 19);
    }
}

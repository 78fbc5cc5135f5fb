//! Weekly session queries and mutations.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{
    format_timestamp, parse_timestamp, SessionResults, WeeklySession, WeeklySubmission,
};

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: String,
    session_date: String,
    rsvp_user_ids: String,
    submissions: String,
    created_at: String,
    closed_at: Option<String>,
    is_active: bool,
    model_name: Option<String>,
    model_image_url: Option<String>,
    results: Option<String>,
}

impl TryFrom<SessionRow> for WeeklySession {
    type Error = DatabaseError;

    fn try_from(row: SessionRow) -> Result<WeeklySession> {
        let session_date = parse_timestamp(&row.session_date)
            .map_err(|e| DatabaseError::decode("WeeklySession", &row.id, e))?;
        let rsvp_user_ids = serde_json::from_str(&row.rsvp_user_ids)
            .map_err(|e| DatabaseError::decode_json("WeeklySession", &row.id, e))?;
        let submissions = serde_json::from_str(&row.submissions)
            .map_err(|e| DatabaseError::decode_json("WeeklySession", &row.id, e))?;
        let created_at = parse_timestamp(&row.created_at)
            .map_err(|e| DatabaseError::decode("WeeklySession", &row.id, e))?;
        let closed_at = row
            .closed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| DatabaseError::decode("WeeklySession", &row.id, e))?;
        let results = row
            .results
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DatabaseError::decode_json("WeeklySession", &row.id, e))?;

        Ok(WeeklySession {
            id: row.id,
            session_date,
            rsvp_user_ids,
            submissions,
            created_at,
            closed_at,
            is_active: row.is_active,
            model_name: row.model_name,
            model_image_url: row.model_image_url,
            results,
        })
    }
}

const SELECT_SESSION: &str = r#"
SELECT id, session_date, rsvp_user_ids, submissions, created_at, closed_at,
       is_active, model_name, model_image_url, results
FROM weekly_sessions
"#;

/// Before/after snapshot pair produced by a session mutation, consumed by
/// the reactive trigger handlers.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    pub before: WeeklySession,
    pub after: WeeklySession,
}

/// Insert a new active session for the given normalized date.
pub async fn insert_session(
    pool: &SqlitePool,
    session_date: DateTime<Utc>,
    model_name: Option<String>,
    model_image_url: Option<String>,
) -> Result<WeeklySession> {
    let session = WeeklySession {
        id: Uuid::new_v4().to_string(),
        session_date,
        rsvp_user_ids: Vec::new(),
        submissions: Vec::new(),
        created_at: Utc::now(),
        closed_at: None,
        is_active: true,
        model_name,
        model_image_url,
        results: None,
    };

    sqlx::query(
        r#"
        INSERT INTO weekly_sessions
            (id, session_date, rsvp_user_ids, submissions, created_at, is_active,
             model_name, model_image_url)
        VALUES (?, ?, '[]', '[]', ?, 1, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(format_timestamp(&session.session_date))
    .bind(format_timestamp(&session.created_at))
    .bind(&session.model_name)
    .bind(&session.model_image_url)
    .execute(pool)
    .await?;

    Ok(session)
}

/// Get a session by ID.
pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<WeeklySession> {
    let row = sqlx::query_as::<_, SessionRow>(&format!("{SELECT_SESSION} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "WeeklySession",
            id: id.to_string(),
        })?;

    WeeklySession::try_from(row)
}

/// Find the active session for a normalized session date.
pub async fn find_active_by_date(
    pool: &SqlitePool,
    session_date: DateTime<Utc>,
) -> Result<Option<WeeklySession>> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "{SELECT_SESSION} WHERE session_date = ? AND is_active = 1 LIMIT 1"
    ))
    .bind(format_timestamp(&session_date))
    .fetch_optional(pool)
    .await?;

    row.map(WeeklySession::try_from).transpose()
}

/// Find the session for a normalized session date, active or closed.
///
/// The weekly cadence closes a session before some of its follow-up jobs
/// run (voting reminders fire after closure), so those jobs resolve the
/// week's session by date alone.
pub async fn find_by_date(
    pool: &SqlitePool,
    session_date: DateTime<Utc>,
) -> Result<Option<WeeklySession>> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "{SELECT_SESSION} WHERE session_date = ? ORDER BY created_at DESC LIMIT 1"
    ))
    .bind(format_timestamp(&session_date))
    .fetch_optional(pool)
    .await?;

    row.map(WeeklySession::try_from).transpose()
}

/// Count active sessions for a normalized session date.
pub async fn count_active_for_date(
    pool: &SqlitePool,
    session_date: DateTime<Utc>,
) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM weekly_sessions WHERE session_date = ? AND is_active = 1",
    )
    .bind(format_timestamp(&session_date))
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Find the most recent session that started before `now`, active or not.
pub async fn find_latest_before(
    pool: &SqlitePool,
    now: DateTime<Utc>,
) -> Result<Option<WeeklySession>> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "{SELECT_SESSION} WHERE session_date < ? ORDER BY session_date DESC LIMIT 1"
    ))
    .bind(format_timestamp(&now))
    .fetch_optional(pool)
    .await?;

    row.map(WeeklySession::try_from).transpose()
}

/// Flip an active session to closed and stamp the closure time.
///
/// The `is_active = 1` guard makes the update conditional: a concurrent or
/// repeated closure finds zero rows affected and reports `false`.
pub async fn close_session(
    pool: &SqlitePool,
    id: &str,
    closed_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE weekly_sessions SET is_active = 0, closed_at = ? WHERE id = ? AND is_active = 1",
    )
    .bind(format_timestamp(&closed_at))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stamp computed results onto a session.
pub async fn set_results(pool: &SqlitePool, id: &str, results: &SessionResults) -> Result<()> {
    let encoded = serde_json::to_string(results)
        .map_err(|e| DatabaseError::decode_json("WeeklySession", id, e))?;

    let result = sqlx::query("UPDATE weekly_sessions SET results = ? WHERE id = ?")
        .bind(encoded)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "WeeklySession",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Add a user to a session's RSVP list (set semantics).
///
/// Returns the before/after snapshot pair for the reactive triggers. A
/// duplicate RSVP leaves the list untouched and returns identical snapshots.
pub async fn add_rsvp(pool: &SqlitePool, id: &str, user_id: &str) -> Result<SessionUpdate> {
    let before = get_session(pool, id).await?;

    if before.rsvp_user_ids.iter().any(|u| u == user_id) {
        return Ok(SessionUpdate {
            after: before.clone(),
            before,
        });
    }

    let mut after = before.clone();
    after.rsvp_user_ids.push(user_id.to_string());

    let encoded = serde_json::to_string(&after.rsvp_user_ids)
        .map_err(|e| DatabaseError::decode_json("WeeklySession", id, e))?;

    sqlx::query("UPDATE weekly_sessions SET rsvp_user_ids = ? WHERE id = ?")
        .bind(encoded)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(SessionUpdate { before, after })
}

/// Record a category vote on a submission (set semantics per voter).
///
/// Returns the before/after snapshot pair. Voting on an unknown submission
/// is a `NotFound`.
pub async fn add_vote(
    pool: &SqlitePool,
    id: &str,
    submission_id: &str,
    category: &str,
    voter_id: &str,
) -> Result<SessionUpdate> {
    let before = get_session(pool, id).await?;

    let mut after = before.clone();
    let submission = after
        .submissions
        .iter_mut()
        .find(|s| s.id == submission_id)
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "WeeklySubmission",
            id: submission_id.to_string(),
        })?;

    let voters = submission.votes.entry(category.to_string()).or_default();
    if !voters.iter().any(|v| v == voter_id) {
        voters.push(voter_id.to_string());
    }

    let encoded = serde_json::to_string(&after.submissions)
        .map_err(|e| DatabaseError::decode_json("WeeklySession", id, e))?;

    sqlx::query("UPDATE weekly_sessions SET submissions = ? WHERE id = ?")
        .bind(encoded)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(SessionUpdate { before, after })
}

/// Append a submission to a session.
///
/// Submissions are immutable once appended; there is no edit or delete path.
/// Returns the before/after snapshot pair for the reactive triggers.
pub async fn append_submission(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    portrait_id: &str,
    portrait_title: &str,
    portrait_image_url: &str,
    artist_notes: Option<String>,
) -> Result<SessionUpdate> {
    let before = get_session(pool, id).await?;

    let submission = WeeklySubmission {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        portrait_id: portrait_id.to_string(),
        portrait_title: portrait_title.to_string(),
        portrait_image_url: portrait_image_url.to_string(),
        submitted_at: Utc::now(),
        artist_notes,
        votes: Default::default(),
    };

    let mut after = before.clone();
    after.submissions.push(submission);

    let encoded = serde_json::to_string(&after.submissions)
        .map_err(|e| DatabaseError::decode_json("WeeklySession", id, e))?;

    sqlx::query("UPDATE weekly_sessions SET submissions = ? WHERE id = ?")
        .bind(encoded)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(SessionUpdate { before, after })
}

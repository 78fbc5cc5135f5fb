//! Typed entities produced at the store boundary.
//!
//! Raw rows carry JSON-shaped columns as TEXT; each query module parses them
//! into these types before anything else sees the data. Code above the
//! database crate never touches an untyped record.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Approval status of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Approved => "approved",
            UserStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "pending" => Ok(UserStatus::Pending),
            "approved" => Ok(UserStatus::Approved),
            "rejected" => Ok(UserStatus::Rejected),
            other => Err(ValidationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Community role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Artist,
    ArtAppreciator,
    Admin,
    Moderator,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Artist => "artist",
            UserRole::ArtAppreciator => "art_appreciator",
            UserRole::Admin => "admin",
            UserRole::Moderator => "moderator",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "artist" => Ok(UserRole::Artist),
            "art_appreciator" => Ok(UserRole::ArtAppreciator),
            "admin" => Ok(UserRole::Admin),
            "moderator" => Ok(UserRole::Moderator),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// A community member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub status: UserStatus,
    pub is_admin: bool,
    pub role: Option<UserRole>,
    /// Opaque device token for the push gateway; absent until the client
    /// registers one.
    pub push_token: Option<String>,
    /// Per-kind push opt-outs. A missing key means enabled.
    pub notification_preferences: HashMap<String, bool>,
    pub created_at: DateTime<Utc>,
}

/// A portrait submission embedded in a weekly session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySubmission {
    pub id: String,
    pub user_id: String,
    pub portrait_id: String,
    pub portrait_title: String,
    pub portrait_image_url: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist_notes: Option<String>,
    /// Category name to the set of voter user ids.
    #[serde(default)]
    pub votes: HashMap<String, Vec<String>>,
}

/// Participation totals stamped onto a session at closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    pub total_participants: usize,
    pub total_submissions: usize,
    /// `round(100 * submissions / participants)`, zero when nobody RSVP'd.
    /// Deliberately not clamped to 100: submissions without an RSVP count.
    pub participation_rate: i64,
    pub processed_at: DateTime<Utc>,
}

/// One weekly critique session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySession {
    pub id: String,
    /// Normalized Monday start (fixed hour, fixed time zone, stored as UTC).
    /// This is the lookup key for the whole weekly cycle.
    pub session_date: DateTime<Utc>,
    pub rsvp_user_ids: Vec<String>,
    pub submissions: Vec<WeeklySubmission>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub model_name: Option<String>,
    pub model_image_url: Option<String>,
    pub results: Option<SessionResults>,
}

/// Notification categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SessionCreated,
    SessionReminder,
    SessionCompleted,
    RsvpConfirmation,
    NewSubmission,
    VotingReminder,
    WinnerAnnouncement,
    WinnersAnnounced,
    Test,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SessionCreated => "session_created",
            NotificationKind::SessionReminder => "session_reminder",
            NotificationKind::SessionCompleted => "session_completed",
            NotificationKind::RsvpConfirmation => "rsvp_confirmation",
            NotificationKind::NewSubmission => "new_submission",
            NotificationKind::VotingReminder => "voting_reminder",
            NotificationKind::WinnerAnnouncement => "winner_announcement",
            NotificationKind::WinnersAnnounced => "winners_announced",
            NotificationKind::Test => "test",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "session_created" => Ok(NotificationKind::SessionCreated),
            "session_reminder" => Ok(NotificationKind::SessionReminder),
            "session_completed" => Ok(NotificationKind::SessionCompleted),
            "rsvp_confirmation" => Ok(NotificationKind::RsvpConfirmation),
            "new_submission" => Ok(NotificationKind::NewSubmission),
            "voting_reminder" => Ok(NotificationKind::VotingReminder),
            "winner_announcement" => Ok(NotificationKind::WinnerAnnouncement),
            "winners_announced" => Ok(NotificationKind::WinnersAnnounced),
            "test" => Ok(NotificationKind::Test),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored notification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub data: serde_json::Value,
    pub push_sent: Option<bool>,
    pub push_sent_at: Option<DateTime<Utc>>,
    pub push_message_id: Option<String>,
    pub push_error: Option<String>,
    pub push_error_at: Option<DateTime<Utc>>,
}

/// A model available for assignment to a session, matched by exact date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionModel {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub date: DateTime<Utc>,
    pub is_active: bool,
}

/// Parse a stored timestamp. Inserts always write RFC 3339, but SQLite
/// column defaults produce `YYYY-MM-DD HH:MM:SS`, so accept both.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| ValidationError::BadTimestamp(value.to_string()))
}

/// Serialize a timestamp the way every insert in this crate stores it.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

//! Notification record storage.
//!
//! Two physical tables carry the same record shape: a flat feed the client
//! lists globally, and a per-user inbox. Callers pick a
//! [`NotificationPlacement`] per notification kind and never branch on the
//! underlying table themselves.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{format_timestamp, parse_timestamp, Notification, NotificationKind};

/// Physical placement of a notification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPlacement {
    /// Flat `notifications` table.
    Feed,
    /// Per-user `user_notifications` table.
    Inbox,
}

impl NotificationPlacement {
    fn table(&self) -> &'static str {
        match self {
            NotificationPlacement::Feed => "notifications",
            NotificationPlacement::Inbox => "user_notifications",
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    kind: String,
    title: String,
    message: String,
    created_at: String,
    read: bool,
    data: String,
    push_sent: Option<bool>,
    push_sent_at: Option<String>,
    push_message_id: Option<String>,
    push_error: Option<String>,
    push_error_at: Option<String>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DatabaseError;

    fn try_from(row: NotificationRow) -> Result<Notification> {
        let kind = NotificationKind::parse(&row.kind)
            .map_err(|e| DatabaseError::decode("Notification", &row.id, e))?;
        let created_at = parse_timestamp(&row.created_at)
            .map_err(|e| DatabaseError::decode("Notification", &row.id, e))?;
        let data = serde_json::from_str(&row.data)
            .map_err(|e| DatabaseError::decode_json("Notification", &row.id, e))?;
        let push_sent_at = row
            .push_sent_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| DatabaseError::decode("Notification", &row.id, e))?;
        let push_error_at = row
            .push_error_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|e| DatabaseError::decode("Notification", &row.id, e))?;

        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind,
            title: row.title,
            message: row.message,
            created_at,
            read: row.read,
            data,
            push_sent: row.push_sent,
            push_sent_at,
            push_message_id: row.push_message_id,
            push_error: row.push_error,
            push_error_at,
        })
    }
}

/// Build a fresh unread notification record, id and timestamp assigned here.
pub fn new_notification(
    user_id: &str,
    kind: NotificationKind,
    title: &str,
    message: &str,
    data: serde_json::Value,
) -> Notification {
    Notification {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        kind,
        title: title.to_string(),
        message: message.to_string(),
        created_at: Utc::now(),
        read: false,
        data,
        push_sent: None,
        push_sent_at: None,
        push_message_id: None,
        push_error: None,
        push_error_at: None,
    }
}

async fn insert_into<'e, E>(
    executor: E,
    placement: NotificationPlacement,
    notification: &Notification,
) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let data = serde_json::to_string(&notification.data)
        .map_err(|e| DatabaseError::decode_json("Notification", &notification.id, e))?;

    sqlx::query(&format!(
        r#"
        INSERT INTO {} (id, user_id, kind, title, message, created_at, read, data)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?)
        "#,
        placement.table()
    ))
    .bind(&notification.id)
    .bind(&notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(format_timestamp(&notification.created_at))
    .bind(data)
    .execute(executor)
    .await?;

    Ok(())
}

/// Insert a single notification record.
pub async fn insert_one(
    pool: &SqlitePool,
    placement: NotificationPlacement,
    notification: &Notification,
) -> Result<()> {
    insert_into(pool, placement, notification).await
}

/// Insert a batch of notification records atomically.
///
/// All records land or none do; a failure part-way through rolls the whole
/// batch back.
pub async fn insert_batch(
    pool: &SqlitePool,
    placement: NotificationPlacement,
    notifications: &[Notification],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for notification in notifications {
        insert_into(&mut *tx, placement, notification).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Record a successful push delivery on a notification.
pub async fn mark_push_sent(
    pool: &SqlitePool,
    placement: NotificationPlacement,
    id: &str,
    message_id: &str,
) -> Result<()> {
    sqlx::query(&format!(
        "UPDATE {} SET push_sent = 1, push_sent_at = ?, push_message_id = ? WHERE id = ?",
        placement.table()
    ))
    .bind(format_timestamp(&Utc::now()))
    .bind(message_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a failed push delivery on a notification.
pub async fn mark_push_failed(
    pool: &SqlitePool,
    placement: NotificationPlacement,
    id: &str,
    error: &str,
) -> Result<()> {
    sqlx::query(&format!(
        "UPDATE {} SET push_error = ?, push_error_at = ? WHERE id = ?",
        placement.table()
    ))
    .bind(error)
    .bind(format_timestamp(&Utc::now()))
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// List a user's notifications, newest first.
pub async fn list_for_user(
    pool: &SqlitePool,
    placement: NotificationPlacement,
    user_id: &str,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query_as::<_, NotificationRow>(&format!(
        r#"
        SELECT id, user_id, kind, title, message, created_at, read, data,
               push_sent, push_sent_at, push_message_id, push_error, push_error_at
        FROM {}
        WHERE user_id = ?
        ORDER BY created_at DESC
        "#,
        placement.table()
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(Notification::try_from).collect()
}

/// Count every record in a placement.
pub async fn count_all(pool: &SqlitePool, placement: NotificationPlacement) -> Result<i64> {
    let count =
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", placement.table()))
            .fetch_one(pool)
            .await?;

    Ok(count)
}

/// Mark a notification as read.
pub async fn mark_read(
    pool: &SqlitePool,
    placement: NotificationPlacement,
    id: &str,
) -> Result<()> {
    let result = sqlx::query(&format!(
        "UPDATE {} SET read = 1 WHERE id = ?",
        placement.table()
    ))
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Notification",
            id: id.to_string(),
        });
    }

    Ok(())
}

//! Idempotency claims for scheduled triggers.
//!
//! Scheduled entry points run at-least-once: the scheduler can re-fire a slot
//! after a crash or a deploy. Before mutating, a trigger claims its
//! `(kind, target_date)` slot; the second run of the same slot finds the claim
//! taken and no-ops.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::format_timestamp;

/// Try to claim a trigger slot. Returns `true` on first claim, `false` when
/// the slot was already claimed.
pub async fn claim(
    pool: &SqlitePool,
    kind: &str,
    target_date: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO trigger_claims (kind, target_date, claimed_at) VALUES (?, ?, ?)",
    )
    .bind(kind)
    .bind(format_timestamp(&target_date))
    .bind(format_timestamp(&Utc::now()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Release a claimed slot so the scheduler's next retry can take it again.
///
/// Used when the mutation guarded by the claim fails before landing;
/// releasing a slot that was never claimed is a no-op.
pub async fn release(
    pool: &SqlitePool,
    kind: &str,
    target_date: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("DELETE FROM trigger_claims WHERE kind = ? AND target_date = ?")
        .bind(kind)
        .bind(format_timestamp(&target_date))
        .execute(pool)
        .await?;

    Ok(())
}

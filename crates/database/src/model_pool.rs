//! Session model pool queries.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DatabaseError, Result};
use crate::models::{format_timestamp, parse_timestamp, SessionModel};

#[derive(Debug, sqlx::FromRow)]
struct SessionModelRow {
    id: String,
    name: String,
    image_url: Option<String>,
    date: String,
    is_active: bool,
}

impl TryFrom<SessionModelRow> for SessionModel {
    type Error = DatabaseError;

    fn try_from(row: SessionModelRow) -> Result<SessionModel> {
        let date = parse_timestamp(&row.date)
            .map_err(|e| DatabaseError::decode("SessionModel", &row.id, e))?;

        Ok(SessionModel {
            id: row.id,
            name: row.name,
            image_url: row.image_url,
            date,
            is_active: row.is_active,
        })
    }
}

/// Add a model to the pool (admin action).
pub async fn add_model(
    pool: &SqlitePool,
    name: &str,
    image_url: Option<&str>,
    date: DateTime<Utc>,
) -> Result<SessionModel> {
    let model = SessionModel {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        image_url: image_url.map(str::to_string),
        date,
        is_active: true,
    };

    sqlx::query(
        "INSERT INTO session_models (id, name, image_url, date, is_active) VALUES (?, ?, ?, ?, 1)",
    )
    .bind(&model.id)
    .bind(&model.name)
    .bind(&model.image_url)
    .bind(format_timestamp(&model.date))
    .execute(pool)
    .await?;

    Ok(model)
}

/// Find the active model assigned to an exact session date, if any.
pub async fn find_for_date(
    pool: &SqlitePool,
    date: DateTime<Utc>,
) -> Result<Option<SessionModel>> {
    let row = sqlx::query_as::<_, SessionModelRow>(
        r#"
        SELECT id, name, image_url, date, is_active
        FROM session_models
        WHERE date = ? AND is_active = 1
        LIMIT 1
        "#,
    )
    .bind(format_timestamp(&date))
    .fetch_optional(pool)
    .await?;

    row.map(SessionModel::try_from).transpose()
}

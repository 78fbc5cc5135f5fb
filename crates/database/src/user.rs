//! User queries and mutations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{format_timestamp, parse_timestamp, User, UserRole, UserStatus};
use crate::validation;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    status: String,
    is_admin: bool,
    role: Option<String>,
    push_token: Option<String>,
    notification_preferences: String,
    created_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<User> {
        let status = UserStatus::parse(&row.status)
            .map_err(|e| DatabaseError::decode("User", &row.id, e))?;
        let role = row
            .role
            .as_deref()
            .map(UserRole::parse)
            .transpose()
            .map_err(|e| DatabaseError::decode("User", &row.id, e))?;
        let notification_preferences = serde_json::from_str(&row.notification_preferences)
            .map_err(|e| DatabaseError::decode_json("User", &row.id, e))?;
        let created_at = parse_timestamp(&row.created_at)
            .map_err(|e| DatabaseError::decode("User", &row.id, e))?;

        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            status,
            is_admin: row.is_admin,
            role,
            push_token: row.push_token,
            notification_preferences,
            created_at,
        })
    }
}

const SELECT_USER: &str = r#"
SELECT id, email, name, status, is_admin, role, push_token,
       notification_preferences, created_at
FROM users
"#;

/// Create a new user.
pub async fn create_user(pool: &SqlitePool, user: &User) -> Result<()> {
    validation::validate_email(&user.email)?;
    validation::validate_name(&user.name)?;

    let preferences = serde_json::to_string(&user.notification_preferences)
        .map_err(|e| DatabaseError::decode_json("User", &user.id, e))?;

    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, status, is_admin, role, push_token,
                           notification_preferences, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(user.status.as_str())
    .bind(user.is_admin)
    .bind(user.role.map(|r| r.as_str()))
    .bind(&user.push_token)
    .bind(preferences)
    .bind(format_timestamp(&user.created_at))
    .execute(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity: "User",
                    id: user.id.clone(),
                };
            }
        }
        DatabaseError::Sqlx(e)
    })?;

    Ok(())
}

/// Get a user by ID.
pub async fn get_user(pool: &SqlitePool, id: &str) -> Result<User> {
    find_user(pool, id).await?.ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: id.to_string(),
    })
}

/// Get a user by ID, returning `None` when the record is gone.
///
/// Trigger paths use this to skip silently instead of treating a vanished
/// user as an error.
pub async fn find_user(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(&format!("{SELECT_USER} WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(User::try_from).transpose()
}

/// List every approved user.
pub async fn list_approved_users(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "{SELECT_USER} WHERE status = 'approved' ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

/// List every approved user with the artist role.
pub async fn list_approved_artists(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query_as::<_, UserRow>(&format!(
        "{SELECT_USER} WHERE status = 'approved' AND role = 'artist' ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(User::try_from).collect()
}

/// Update a user's approval status (admin action).
pub async fn set_status(pool: &SqlitePool, id: &str, status: UserStatus) -> Result<()> {
    let result = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Register or replace a user's push token.
pub async fn set_push_token(pool: &SqlitePool, id: &str, token: Option<&str>) -> Result<()> {
    let result = sqlx::query("UPDATE users SET push_token = ? WHERE id = ?")
        .bind(token)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Replace a user's per-kind notification preferences.
pub async fn set_notification_preferences(
    pool: &SqlitePool,
    id: &str,
    preferences: &std::collections::HashMap<String, bool>,
) -> Result<()> {
    let encoded = serde_json::to_string(preferences)
        .map_err(|e| DatabaseError::decode_json("User", id, e))?;

    let result = sqlx::query("UPDATE users SET notification_preferences = ? WHERE id = ?")
        .bind(encoded)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: id.to_string(),
        });
    }

    Ok(())
}

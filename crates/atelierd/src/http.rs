//! HTTP surface.
//!
//! Mutation ingress for RSVPs, submissions, and votes (the store mutation
//! runs first, then the before/after snapshots feed the reactive triggers),
//! plus operational test endpoints for creating a throwaway session and
//! sending a direct push.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use database::{session, user, Database, DatabaseError};
use lifecycle::{Category, SessionLifecycle};
use push_gateway::{PushGateway, PushMessage};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub lifecycle: Arc<SessionLifecycle>,
    pub gateway: Arc<dyn PushGateway>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions/:id/rsvp", post(add_rsvp))
        .route("/sessions/:id/submissions", post(add_submission))
        .route("/sessions/:id/submissions/:submission_id/votes", post(add_vote))
        .route("/test/session", post(test_session))
        .route("/test/push", post(test_push))
        .with_state(state)
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn failure(status: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "success": false, "error": message })))
}

fn db_failure(err: DatabaseError) -> (StatusCode, Json<Value>) {
    match err {
        DatabaseError::NotFound { .. } => failure(StatusCode::NOT_FOUND, &err.to_string()),
        DatabaseError::Validation(_) => failure(StatusCode::BAD_REQUEST, &err.to_string()),
        other => {
            warn!(error = %other, "Store operation failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct RsvpRequest {
    user_id: String,
}

async fn add_rsvp(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RsvpRequest>,
) -> ApiResult {
    let update = session::add_rsvp(state.db.pool(), &id, &body.user_id)
        .await
        .map_err(db_failure)?;

    if let Err(err) = state
        .lifecycle
        .handle_session_update(Some(&update.before), Some(&update.after))
        .await
    {
        warn!(session_id = %id, error = %err, "RSVP trigger failed");
    }

    Ok(Json(json!({
        "success": true,
        "rsvp_count": update.after.rsvp_user_ids.len(),
    })))
}

#[derive(Debug, Deserialize)]
struct SubmissionRequest {
    user_id: String,
    portrait_id: String,
    portrait_title: String,
    portrait_image_url: String,
    #[serde(default)]
    artist_notes: Option<String>,
}

async fn add_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SubmissionRequest>,
) -> ApiResult {
    let update = session::append_submission(
        state.db.pool(),
        &id,
        &body.user_id,
        &body.portrait_id,
        &body.portrait_title,
        &body.portrait_image_url,
        body.artist_notes,
    )
    .await
    .map_err(db_failure)?;

    if let Err(err) = state
        .lifecycle
        .handle_session_update(Some(&update.before), Some(&update.after))
        .await
    {
        warn!(session_id = %id, error = %err, "Submission trigger failed");
    }

    let submission_id = update
        .after
        .submissions
        .last()
        .map(|s| s.id.clone())
        .unwrap_or_default();

    Ok(Json(json!({ "success": true, "submission_id": submission_id })))
}

#[derive(Debug, Deserialize)]
struct VoteRequest {
    category: String,
    voter_id: String,
}

async fn add_vote(
    State(state): State<AppState>,
    Path((id, submission_id)): Path<(String, String)>,
    Json(body): Json<VoteRequest>,
) -> ApiResult {
    if !Category::ALL.iter().any(|c| c.key() == body.category) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            &format!("unknown voting category: {}", body.category),
        ));
    }

    session::add_vote(
        state.db.pool(),
        &id,
        &submission_id,
        &body.category,
        &body.voter_id,
    )
    .await
    .map_err(db_failure)?;

    Ok(Json(json!({ "success": true })))
}

/// Create a throwaway session for next Monday, bypassing the idempotency
/// claim so a test run never blocks the real Monday slot.
async fn test_session(State(state): State<AppState>) -> ApiResult {
    let session_date = state.lifecycle.calendar().next_monday(Utc::now());
    let created = session::insert_session(state.db.pool(), session_date, None, None)
        .await
        .map_err(db_failure)?;

    info!(session_id = %created.id, "Created test session");

    Ok(Json(json!({
        "success": true,
        "message": "Test session created successfully",
        "session_id": created.id,
        "session_date": created.session_date.to_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
struct TestPushRequest {
    user_id: String,
    title: String,
    body: String,
}

/// Send a direct push to one user, skipping record creation entirely.
async fn test_push(State(state): State<AppState>, Json(body): Json<TestPushRequest>) -> ApiResult {
    let target = user::find_user(state.db.pool(), &body.user_id)
        .await
        .map_err(db_failure)?
        .ok_or_else(|| failure(StatusCode::NOT_FOUND, "User not found"))?;

    let Some(token) = target.push_token.as_deref() else {
        return Err(failure(StatusCode::BAD_REQUEST, "No push token found for user"));
    };

    let message = PushMessage::new(token, &body.title, &body.body)
        .with_data("kind", "test")
        .with_data("user_id", &target.id)
        .with_data("timestamp", &Utc::now().to_rfc3339());

    match state.gateway.send(message).await {
        Ok(delivery_id) => {
            info!(user_id = %target.id, delivery_id = %delivery_id, "Test push sent");
            Ok(Json(json!({
                "success": true,
                "message": "Test push notification sent successfully",
                "delivery_id": delivery_id,
            })))
        }
        Err(err) => Err(failure(StatusCode::BAD_GATEWAY, &err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle::{LifecycleConfig, SessionCalendar};
    use notifier::NotificationDispatcher;
    use push_gateway::MockGateway;

    async fn test_state() -> (AppState, Arc<MockGateway>) {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let gateway = Arc::new(MockGateway::new());
        let dispatcher = Arc::new(NotificationDispatcher::new(db.clone(), gateway.clone()));
        let lifecycle = Arc::new(SessionLifecycle::new(
            db.clone(),
            dispatcher,
            SessionCalendar::default(),
            LifecycleConfig::default(),
        ));
        (
            AppState {
                db,
                lifecycle,
                gateway: gateway.clone(),
            },
            gateway,
        )
    }

    #[tokio::test]
    async fn rsvp_ingress_runs_the_confirmation_trigger() {
        let (state, gateway) = test_state().await;

        let member = database::User {
            id: "m1".to_string(),
            email: "m1@example.com".to_string(),
            name: "M1".to_string(),
            status: database::UserStatus::Approved,
            is_admin: false,
            role: None,
            push_token: Some("tok-m1".to_string()),
            notification_preferences: Default::default(),
            created_at: Utc::now(),
        };
        user::create_user(state.db.pool(), &member).await.unwrap();

        let created = session::insert_session(state.db.pool(), Utc::now(), None, None)
            .await
            .unwrap();

        let response = add_rsvp(
            State(state.clone()),
            Path(created.id.clone()),
            Json(RsvpRequest {
                user_id: "m1".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.0["rsvp_count"], json!(1));

        // The reactive trigger confirmed the RSVP with a push
        assert_eq!(gateway.sent_count().await, 1);
    }

    #[tokio::test]
    async fn vote_ingress_rejects_unknown_categories() {
        let (state, _gateway) = test_state().await;
        let result = add_vote(
            State(state),
            Path(("s1".to_string(), "sub1".to_string())),
            Json(VoteRequest {
                category: "composition".to_string(),
                voter_id: "v1".to_string(),
            }),
        )
        .await;

        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_push_requires_a_token() {
        let (state, _gateway) = test_state().await;

        let member = database::User {
            id: "m1".to_string(),
            email: "m1@example.com".to_string(),
            name: "M1".to_string(),
            status: database::UserStatus::Approved,
            is_admin: false,
            role: None,
            push_token: None,
            notification_preferences: Default::default(),
            created_at: Utc::now(),
        };
        user::create_user(state.db.pool(), &member).await.unwrap();

        let result = test_push(
            State(state),
            Json(TestPushRequest {
                user_id: "m1".to_string(),
                title: "Hi".to_string(),
                body: "There".to_string(),
            }),
        )
        .await;

        let (status, _) = result.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

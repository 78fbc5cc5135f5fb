//! Atelier daemon.
//!
//! Wires the database, push gateway, dispatcher, and session lifecycle
//! together, spawns the weekly schedule loops, and serves the HTTP surface.

mod http;
mod schedule;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{info, warn};

use database::Database;
use lifecycle::{LifecycleConfig, ReminderAudience, SessionCalendar, SessionLifecycle};
use notifier::NotificationDispatcher;
use push_gateway::{HttpGateway, MockGateway, PushGateway};

fn audience_from_env(var: &str, default: ReminderAudience) -> ReminderAudience {
    match env::var(var) {
        Ok(value) => ReminderAudience::parse(&value).unwrap_or_else(|| {
            warn!(var, value, "Unknown reminder audience, using default");
            default
        }),
        Err(_) => default,
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let db_url =
        env::var("ATELIER_DB_URL").unwrap_or_else(|_| "sqlite:atelier.db?mode=rwc".to_string());
    let addr = env::var("ATELIER_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8788".to_string());

    let tz: Tz = env::var("ATELIER_TZ")
        .unwrap_or_else(|_| "America/New_York".to_string())
        .parse()
        .expect("Invalid ATELIER_TZ");
    let session_hour: u32 = env::var("ATELIER_SESSION_HOUR")
        .unwrap_or_else(|_| "18".to_string())
        .parse()
        .expect("Invalid ATELIER_SESSION_HOUR");

    let db = Database::connect(&db_url).await.expect("Database connection failed");
    db.migrate().await.expect("Database migration failed");

    let gateway: Arc<dyn PushGateway> = match env::var("ATELIER_PUSH_ENDPOINT") {
        Ok(endpoint) => {
            let auth_token = env::var("ATELIER_PUSH_TOKEN").ok();
            info!(%endpoint, "Using HTTP push relay");
            Arc::new(HttpGateway::new(&endpoint, auth_token))
        }
        Err(_) => {
            warn!("ATELIER_PUSH_ENDPOINT not set, push delivery disabled (recording mock)");
            Arc::new(MockGateway::new())
        }
    };

    let config = LifecycleConfig {
        session_reminder_audience: audience_from_env(
            "ATELIER_SESSION_REMINDER_AUDIENCE",
            ReminderAudience::AllApproved,
        ),
        voting_reminder_audience: audience_from_env(
            "ATELIER_VOTING_REMINDER_AUDIENCE",
            ReminderAudience::NotYetActed,
        ),
    };

    let calendar = SessionCalendar::new(tz, session_hour);
    let dispatcher = Arc::new(NotificationDispatcher::new(db.clone(), gateway.clone()));
    let lifecycle = Arc::new(SessionLifecycle::new(
        db.clone(),
        dispatcher,
        calendar,
        config,
    ));

    schedule::spawn_all(lifecycle.clone(), tz, session_hour);

    let state = http::AppState {
        db,
        lifecycle,
        gateway,
    };
    let app = http::router(state);

    let addr: SocketAddr = addr.parse().expect("Invalid ATELIER_HTTP_ADDR");
    info!(%addr, "Atelier daemon listening");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Bind failed");
    axum::serve(listener, app).await.expect("Server failed");
}

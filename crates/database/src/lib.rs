//! SQLite persistence layer for Atelier.
//!
//! This crate provides async database operations for users, weekly sessions,
//! and notifications using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use database::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:atelier.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Open this week's session
//!     let session = database::session::insert_session(db.pool(), Utc::now(), None, None).await?;
//!     println!("session {} open", session.id);
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod models;
pub mod model_pool;
pub mod notification;
pub mod session;
pub mod trigger_claim;
pub mod user;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    Notification, NotificationKind, SessionModel, SessionResults, User, UserRole, UserStatus,
    WeeklySession, WeeklySubmission,
};
pub use notification::NotificationPlacement;
pub use session::SessionUpdate;
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    /// Set high enough to handle overlapping trigger invocations.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist, or
    /// `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

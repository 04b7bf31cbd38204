//! Database wiring: pool construction, schema migration and the
//! Postgres-backed persistence ports.

pub mod ports;
pub mod postgres;

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::warn;

use crate::error::{AnalysisError, Result};

/// Open a connection pool against `database_url`.
///
/// The pool keeps a small floor of warm connections and recycles the
/// rest aggressively; analysis traffic is bursty, not sustained.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!(
                "Failed to connect to database: {e}"
            ))
        })
}

/// Run migrations after performing preflight checks.
pub async fn initialize_schema(pool: &PgPool) -> Result<()> {
    preflight(pool).await?;

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AnalysisError::Internal(format!("Migration failed: {e}")))?;

    Ok(())
}

/// Verify the connection is usable and the role can create objects
/// before migrations commit us to anything.
pub async fn preflight(pool: &PgPool) -> Result<()> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| {
            AnalysisError::Internal(format!("Database ping failed: {e}"))
        })?;

    let can_create = sqlx::query_scalar::<_, bool>(
        "SELECT has_schema_privilege(current_user, 'public', 'CREATE')",
    )
    .fetch_one(pool)
    .await
    .map_err(|e| {
        AnalysisError::Internal(format!("Privilege preflight failed: {e}"))
    })?;

    if !can_create {
        warn!(
            "current role lacks CREATE on schema public; migrations may fail"
        );
    }

    Ok(())
}

//! Schema migrations.

use lumen_core::error::DomainError;
use sqlx::PgPool;
use tracing::info;

/// Applies every pending migration under `migrations/`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("failed to run migrations: {e}")))?;
    info!("database migrations applied");
    Ok(())
}

/// Embedded schema migrations
///
/// Migration files live in `tickup-shared/migrations/` and are compiled into
/// the binary with `sqlx::migrate!`, so a deployed server can bring an empty
/// database up to date on startup.

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Applies every migration that has not run yet
///
/// # Errors
///
/// Returns the first migration failure; sqlx rolls back that migration.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}

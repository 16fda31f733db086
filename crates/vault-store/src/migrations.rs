use crate::error::StoreError;
use sqlx::SqlitePool;

/// Create the `files` and `config` collections if they are missing.
///
/// Runs as part of the first open; a failure here means the store never
/// became usable, so it is reported as `Unavailable`.
pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))
}

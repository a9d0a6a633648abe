//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! harvest-cli migrate
//! ```
//!
//! Migrations live in `crates/api/migrations/` and create the `market`
//! schema plus the `tower_sessions.session` table.

use super::{CommandError, connect};

/// Run every pending migration.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}

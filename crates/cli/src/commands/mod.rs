//! CLI command implementations.
//!
//! # Environment Variables
//!
//! - `HARVEST_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

pub mod migrate;
pub mod seed;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use harvest_api::db::{self, RepositoryError};
use harvest_core::EmailError;

/// Errors shared by the CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Invalid role list.
    #[error("{0}. Valid roles: admin, courier, farmer")]
    InvalidRole(String),

    /// Store operation failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Connect to the database named by the environment.
///
/// # Errors
///
/// Returns `CommandError::MissingEnvVar` if no database URL is set, or
/// `CommandError::Database` if the connection fails.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("HARVEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("HARVEST_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url, 2).await?)
}

//! Session middleware configuration.
//!
//! Sessions are stored in `PostgreSQL` by tower-sessions. The sign-in service
//! writes the caller's [`Identity`] under [`session_keys::CURRENT_USER`];
//! this service only reads it.

use axum::{extract::Request, middleware::Next, response::Response};
use sqlx::PgPool;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::models::{Identity, session_keys};

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "harvest_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// # Arguments
///
/// * `pool` - `PostgreSQL` connection pool
/// * `is_secure` - Whether the service is served over HTTPS
#[must_use]
pub fn create_session_layer(pool: &PgPool, is_secure: bool) -> SessionManagerLayer<PostgresStore> {
    // The session table is created by the migrations, not on startup
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// Copy the signed-in [`Identity`] from the session into request extensions.
///
/// Requests without a session, or with an unreadable one, pass through
/// anonymously. Identities already present in extensions are left alone.
pub async fn identity_from_session(mut request: Request, next: Next) -> Response {
    if request.extensions().get::<Identity>().is_none()
        && let Some(session) = request.extensions().get::<Session>().cloned()
    {
        match session.get::<Identity>(session_keys::CURRENT_USER).await {
            Ok(Some(identity)) => {
                tracing::Span::current().record("user", identity.email.as_str());
                request.extensions_mut().insert(identity);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Unreadable session identity"),
        }
    }

    next.run(request).await
}

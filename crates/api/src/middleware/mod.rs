//! HTTP middleware stack for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Identity (copy the signed-in caller into extensions)

pub mod auth;
pub mod request_id;
pub mod session;

pub use auth::{OptionalIdentity, RequireAdmin, RequireCourier, RequireIdentity};
pub use request_id::request_id_middleware;
pub use session::{create_session_layer, identity_from_session};

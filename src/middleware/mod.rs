//! Middleware for Atrium.
//!
//! Session-cookie authentication for browser clients:
//! - `require_session` - reject anonymous requests
//! - `require_admin` - reject non-admin users (layered after require_session)

mod session_auth;

pub use session_auth::{require_admin, require_session, SessionUser, SESSION_COOKIE_NAME};

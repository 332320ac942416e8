mod auth;

pub use auth::{require_auth, current_user, SESSION_USER_KEY};

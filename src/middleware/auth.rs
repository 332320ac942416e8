use axum::{
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    extract::Request,
    body::Body,
};
use tower_sessions::Session;
use crate::errors::{AppError, AppResult};
use crate::models::User;

pub const SESSION_USER_KEY: &str = "current_user";

fn is_public(path: &str) -> bool {
    matches!(path, "/" | "/login" | "/register") || path.starts_with("/static/")
}

pub async fn require_auth(
    session: Session,
    req: Request<Body>,
    next: Next,
) -> Response {
    if is_public(req.uri().path()) {
        return next.run(req).await;
    }

    match session.get::<User>(SESSION_USER_KEY).await {
        Ok(Some(_)) => next.run(req).await,
        _ => Redirect::to("/").into_response(),
    }
}

/// The signed-in user, or an auth error that redirects to the login page.
pub async fn current_user(session: &Session) -> AppResult<User> {
    session
        .get::<User>(SESSION_USER_KEY)
        .await
        .map_err(|e| AppError::Auth(format!("Session error: {}", e)))?
        .ok_or_else(|| AppError::Auth("Not authenticated".into()))
}

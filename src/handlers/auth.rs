use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Response, Redirect},
};
use tower_sessions::Session;
use bcrypt::{hash, verify};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::errors::response::redirect_with_notice;
use crate::middleware::SESSION_USER_KEY;
use crate::models::{LoginForm, RegisterForm, StoredUser, User};
use crate::services::SharedStore;
use super::render_template;

pub async fn serve_login_page() -> AppResult<Response> {
    let login_html = render_template("login.html")?;
    Ok(Html(login_html).into_response())
}

fn register_error(message: &str) -> AppError {
    AppError::validation("/?form=register", message)
}

pub async fn handle_login(
    State((store, _)): State<(SharedStore, Config)>,
    session: Session,
    Form(login_form): Form<LoginForm>,
) -> AppResult<Response> {
    let email = login_form.email.trim().to_lowercase();
    tracing::info!("Login attempt for {}", email);

    let stored = store
        .get_user(&email)
        .await?
        .ok_or_else(|| AppError::validation("/", "No account exists for that email"))?;

    let valid = verify(&login_form.password, &stored.password_hash).map_err(|e| {
        tracing::error!("Password check failed for {}: {}", email, e);
        AppError::Auth("Server error".into())
    })?;
    if !valid {
        tracing::info!("Invalid password for {}", email);
        return Err(AppError::validation("/", "Password is incorrect, please re-enter"));
    }

    session
        .insert(SESSION_USER_KEY, stored.user.clone())
        .await
        .map_err(|e| AppError::Auth(format!("Session error: {}", e)))?;

    tracing::info!("{} signed in", email);
    Ok(Redirect::to("/user").into_response())
}

pub async fn handle_register(
    State((store, config)): State<(SharedStore, Config)>,
    Form(register_form): Form<RegisterForm>,
) -> AppResult<Response> {
    let name = register_form.name.trim();
    let email = register_form.email.trim().to_lowercase();

    if name.is_empty() {
        return Err(register_error("Please enter your name"));
    }
    if !email.contains('@') {
        return Err(register_error("Please enter a valid email address"));
    }
    if register_form.password.is_empty() {
        return Err(register_error("Please choose a password"));
    }
    if register_form.password != register_form.confirm_password {
        return Err(register_error("Passwords don't match"));
    }
    if store.get_user(&email).await?.is_some() {
        return Err(register_error("An account with that email already exists"));
    }

    let password_hash = hash(register_form.password.as_bytes(), config.auth.bcrypt_cost)
        .map_err(|e| {
            tracing::error!("Failed to hash password: {}", e);
            register_error("Registration failed")
        })?;

    let user = StoredUser {
        user: User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.clone(),
        },
        password_hash,
        jobs: Vec::new(),
    };
    store.save_user(&user).await?;

    tracing::info!("Registered {}", email);
    Ok(redirect_with_notice("/", "Registration successful! Please login").into_response())
}

pub async fn handle_logout(session: Session) -> Response {
    if let Err(e) = session.remove::<User>(SESSION_USER_KEY).await {
        tracing::warn!("Session removal error: {}", e);
    }
    Redirect::to("/").into_response()
}

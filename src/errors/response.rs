use axum::{
    response::{IntoResponse, Response, Redirect},
    http::StatusCode,
};
use crate::errors::{
    AppError,
    store::StoreError,
};

fn redirect_with_param(target: &str, key: &str, message: &str) -> Redirect {
    let separator = if target.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{}{}{}={}",
        target,
        separator,
        key,
        urlencoding::encode(message)
    ))
}

/// Appends `error=<message>` so the target page raises an error toast.
pub fn redirect_with_error(target: &str, message: &str) -> Redirect {
    redirect_with_param(target, "error", message)
}

/// Same as `redirect_with_error` but for a success toast.
pub fn redirect_with_notice(target: &str, message: &str) -> Redirect {
    redirect_with_param(target, "notice", message)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            // Authentication errors send the user back to the login page
            AppError::Auth(msg) => redirect_with_error("/", &msg).into_response(),

            AppError::Validation { redirect, message } => {
                redirect_with_error(&redirect, &message).into_response()
            }

            AppError::Store(e) => convert_store_error(e),

            AppError::File(e) => match e.kind() {
                std::io::ErrorKind::NotFound => (
                    StatusCode::NOT_FOUND,
                    format!("File error: {}", e)
                ).into_response(),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("File error: {}", e)
                ).into_response(),
            },

            AppError::Upload(msg) => (
                StatusCode::BAD_REQUEST,
                format!("Upload error: {}", msg)
            ).into_response(),

            AppError::Job(msg) => (
                StatusCode::NOT_FOUND,
                format!("Job error: {}", msg)
            ).into_response(),
        }
    }
}

fn convert_store_error(err: StoreError) -> Response {
    tracing::error!("Storage failure: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Storage error: {}", err)
    ).into_response()
}

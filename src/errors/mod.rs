// Error types shared by the HTTP layer, the store and the grading worker.
use thiserror::Error;

pub mod response;
pub mod grading;
pub mod store;

pub use grading::{GradingError, GradingOutcome};
pub use store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    #[error("Job error: {0}")]
    Job(String),

    #[error("Upload error: {0}")]
    Upload(String),

    // Shown to the user as a toast on the page it came from
    #[error("{message}")]
    Validation { redirect: String, message: String },
}

impl AppError {
    pub fn validation(redirect: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            redirect: redirect.into(),
            message: message.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

use thiserror::Error;
use std::io;
use super::store::StoreError;

#[derive(Error, Debug)]
pub enum GradingError {
    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Job panicked: {0}")]
    JobPanic(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Rubric has no gradable criteria")]
    EmptyRubric,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

pub type GradingOutcome<T> = Result<T, GradingError>;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Non-file fields of the grading form.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SubmissionForm {
    pub exam_title: String,
    pub subject: String,
    pub rubric: String,  // custom rubric text, overrides the subject's default when non-empty
    pub use_ocr: bool,
}

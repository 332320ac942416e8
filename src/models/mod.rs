mod user;
mod forms;
mod job;
mod grading;

pub use user::{User, StoredUser};
pub use forms::{LoginForm, RegisterForm, SubmissionForm};
pub use job::{GradingJob, JobStatus, StudentFile};
pub use grading::{Criterion, CriterionResult, GradingResult};

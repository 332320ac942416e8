use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use super::grading::{Criterion, GradingResult};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// An uploaded answer sheet waiting on disk for the worker.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StudentFile {
    pub filename: String,
    pub path: String,
    pub mime_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GradingJob {
    pub job_id: String,
    pub owner: String,  // owner's email
    pub exam_title: String,
    pub subject: String,
    pub criteria: Vec<Criterion>,
    pub use_ocr: bool,
    pub files: Vec<StudentFile>,
    pub status: JobStatus,
    pub results: Vec<GradingResult>,
    pub error: Option<String>,
    pub result_path: String,
    pub submission_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
}

impl GradingJob {
    /// Mean of the per-file totals, if anything has been graded.
    pub fn class_average(&self) -> Option<f64> {
        if self.results.is_empty() {
            return None;
        }
        let sum: f64 = self.results.iter().map(|r| r.score).sum();
        Some(sum / self.results.len() as f64)
    }
}

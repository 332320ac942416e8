use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use chrono::Utc;
use crate::errors::{GradingError, GradingOutcome};
use crate::grading::{Grader, LoadedFile};
use crate::models::{GradingJob, GradingResult, JobStatus, StudentFile};
use crate::services::SharedStore;
use super::report::write_reports;

/// Everything a worker needs to pick up and grade jobs.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: SharedStore,
    pub grader: Arc<Grader>,
    pub job_timeout_secs: u64,
}

pub async fn worker_process(ctx: WorkerContext, semaphore: Arc<Semaphore>) {
    tracing::info!("Worker started");

    loop {
        // Hold a permit before popping so queued jobs wait for capacity
        let permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!("Failed to acquire semaphore: {}", e);
                sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        match ctx.store.pop_job().await {
            Ok(Some(job_id)) => {
                match process_job(&ctx, &job_id).await {
                    Ok(status) => tracing::info!("Job {} finished as {:?}", job_id, status),
                    Err(e) => tracing::error!("Job {} could not be processed: {}", job_id, e),
                }
                drop(permit);
            }
            Ok(None) => {
                drop(permit);
                sleep(Duration::from_secs(1)).await;
            }
            Err(e) => {
                tracing::error!("Failed to pop job from queue: {}", e);
                drop(permit);
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Grades one queued job end to end and records the outcome.
///
/// Grading failures are stored on the job as `Failed`; only storage problems
/// and a vanished job surface as `Err`.
pub async fn process_job(ctx: &WorkerContext, job_id: &str) -> GradingOutcome<JobStatus> {
    let mut job = ctx
        .store
        .get_job(job_id)
        .await?
        .ok_or_else(|| GradingError::Processing(format!("Job {} not found", job_id)))?;

    tracing::debug!("Processing job {} for {}", job_id, job.owner);
    job.status = JobStatus::Processing;
    ctx.store.save_job(&job).await?;

    let outcome = grade_with_timeout(ctx, &job).await;
    remove_uploads(&job.files).await;

    match outcome {
        Ok(results) => {
            job.results = results;
            job.status = JobStatus::Completed;
            job.error = None;
        }
        Err(e) => {
            tracing::error!("Job {} failed: {}", job_id, e);
            job.status = JobStatus::Failed;
            job.error = Some(e.to_string());
        }
    }
    job.completion_time = Some(Utc::now());

    // The owner may have deleted the job while it was being graded
    if ctx.store.get_job(job_id).await?.is_none() {
        tracing::warn!("Job {} was deleted during grading; discarding results", job_id);
        return Ok(job.status);
    }

    if job.status == JobStatus::Completed {
        if let Err(e) = write_reports(&job).await {
            tracing::error!("Failed to write reports for job {}: {}", job_id, e);
        }
    }

    // A delete that landed while the reports were written leaves them orphaned
    if ctx.store.get_job(job_id).await?.is_none() {
        tracing::warn!("Job {} was deleted while writing reports", job_id);
        remove_result_dir(&job.result_path).await;
        return Ok(job.status);
    }
    ctx.store.save_job(&job).await?;

    Ok(job.status)
}

async fn grade_with_timeout(
    ctx: &WorkerContext,
    job: &GradingJob,
) -> GradingOutcome<Vec<GradingResult>> {
    if job.criteria.is_empty() {
        return Err(GradingError::EmptyRubric);
    }

    let files = load_files(&job.files).await?;
    let grader = ctx.grader.clone();
    let subject = job.subject.clone();
    let criteria = job.criteria.clone();
    let use_ocr = job.use_ocr;
    let timeout_secs = ctx.job_timeout_secs;

    tracing::debug!(
        "Grading {} files with a timeout of {} seconds",
        files.len(),
        timeout_secs
    );

    // Spawned so a panic inside grading is caught as a JoinError
    let mut handle = tokio::spawn(async move {
        grader.grade_submission(&subject, &files, &criteria, use_ocr).await
    });

    match tokio::time::timeout(Duration::from_secs(timeout_secs), &mut handle).await {
        Ok(Ok(results)) => Ok(results),
        Ok(Err(e)) => {
            tracing::error!("Grading task panicked: {}", e);
            Err(GradingError::JobPanic(e.to_string()))
        }
        Err(_) => {
            handle.abort();
            tracing::error!("Grading timed out after {} seconds", timeout_secs);
            Err(GradingError::Timeout(timeout_secs))
        }
    }
}

async fn load_files(files: &[StudentFile]) -> GradingOutcome<Vec<LoadedFile>> {
    let mut loaded = Vec::with_capacity(files.len());
    for file in files {
        let data = match tokio::fs::read(&file.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GradingError::FileNotFound(file.path.clone()));
            }
            Err(e) => return Err(GradingError::Io(e)),
        };
        loaded.push(LoadedFile {
            name: file.filename.clone(),
            mime_type: file.mime_type.clone(),
            data: data.into(),
        });
    }
    Ok(loaded)
}

async fn remove_result_dir(path: &str) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => tracing::debug!("Deleted result directory {}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to delete result directory {}: {}", path, e),
    }
}

async fn remove_uploads(files: &[StudentFile]) {
    for file in files {
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => tracing::debug!("Deleted upload {}", file.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to delete upload {}: {}", file.path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use crate::grading::{ScoringModel, ScoringRequest};
    use crate::models::Criterion;
    use crate::services::{GradingStore, MemoryStore};

    struct FixedModel;

    #[async_trait]
    impl ScoringModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: &ScoringRequest) -> Result<String> {
            Ok("Score: 80/100\nFeedback: Good.".into())
        }
    }

    fn context(store: MemoryStore) -> WorkerContext {
        WorkerContext {
            store: Arc::new(store),
            grader: Arc::new(Grader::new(Arc::new(FixedModel), 100.0)),
            job_timeout_secs: 30,
        }
    }

    fn job(dir: &std::path::Path, files: Vec<StudentFile>, criteria: Vec<Criterion>) -> GradingJob {
        GradingJob {
            job_id: "job-1".into(),
            owner: "t@example.com".into(),
            exam_title: "Quiz".into(),
            subject: "Chemistry".into(),
            criteria,
            use_ocr: false,
            files,
            status: JobStatus::Queued,
            results: Vec::new(),
            error: None,
            result_path: dir.join("results").to_string_lossy().into_owned(),
            submission_time: Utc::now(),
            completion_time: None,
        }
    }

    #[tokio::test]
    async fn completes_job_and_removes_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("answer.txt");
        std::fs::write(&upload, "NaCl is table salt").unwrap();

        let store = MemoryStore::new();
        let files = vec![StudentFile {
            filename: "answer.txt".into(),
            path: upload.to_string_lossy().into_owned(),
            mime_type: "text/plain".into(),
        }];
        let criteria = vec![Criterion { name: "Accuracy".into(), weight: 100.0 }];
        store.save_job(&job(dir.path(), files, criteria)).await.unwrap();

        let ctx = context(store.clone());
        let status = process_job(&ctx, "job-1").await.unwrap();
        assert_eq!(status, JobStatus::Completed);

        let saved = store.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(saved.results.len(), 1);
        assert_eq!(saved.results[0].score, 80.0);
        assert!(saved.completion_time.is_some());
        assert!(!upload.exists());
        assert!(dir.path().join("results").join("report.csv").exists());
    }

    #[tokio::test]
    async fn missing_upload_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let files = vec![StudentFile {
            filename: "gone.png".into(),
            path: dir.path().join("gone.png").to_string_lossy().into_owned(),
            mime_type: "image/png".into(),
        }];
        let criteria = vec![Criterion { name: "Accuracy".into(), weight: 100.0 }];
        store.save_job(&job(dir.path(), files, criteria)).await.unwrap();

        let status = process_job(&context(store.clone()), "job-1").await.unwrap();
        assert_eq!(status, JobStatus::Failed);

        let saved = store.get_job("job-1").await.unwrap().unwrap();
        assert!(saved.error.unwrap().contains("gone.png"));
    }

    #[tokio::test]
    async fn empty_rubric_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        store.save_job(&job(dir.path(), Vec::new(), Vec::new())).await.unwrap();

        let status = process_job(&context(store), "job-1").await.unwrap();
        assert_eq!(status, JobStatus::Failed);
    }

    // Deletes the job from the store while its criteria are being scored
    struct DeletingModel {
        store: MemoryStore,
    }

    #[async_trait]
    impl ScoringModel for DeletingModel {
        fn name(&self) -> &str {
            "deleting"
        }

        async fn complete(&self, _request: &ScoringRequest) -> Result<String> {
            self.store.delete_job("job-1").await?;
            Ok("Score: 50".into())
        }
    }

    #[tokio::test]
    async fn job_deleted_mid_grading_leaves_no_reports() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("answer.txt");
        std::fs::write(&upload, "H2O").unwrap();

        let store = MemoryStore::new();
        let files = vec![StudentFile {
            filename: "answer.txt".into(),
            path: upload.to_string_lossy().into_owned(),
            mime_type: "text/plain".into(),
        }];
        let criteria = vec![Criterion { name: "Accuracy".into(), weight: 100.0 }];
        store.save_job(&job(dir.path(), files, criteria)).await.unwrap();

        let ctx = WorkerContext {
            store: Arc::new(store.clone()),
            grader: Arc::new(Grader::new(Arc::new(DeletingModel { store: store.clone() }), 100.0)),
            job_timeout_secs: 30,
        };
        let status = process_job(&ctx, "job-1").await.unwrap();

        assert_eq!(status, JobStatus::Completed);
        assert!(store.get_job("job-1").await.unwrap().is_none());
        assert!(!dir.path().join("results").exists());
        assert!(!upload.exists());
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let result = process_job(&context(MemoryStore::new()), "nope").await;
        assert!(matches!(result, Err(GradingError::Processing(_))));
    }
}

use std::sync::Arc;
use async_trait::async_trait;
use crate::errors::store::StoreResult;
use crate::models::{StoredUser, GradingJob};

pub const USERS_KEY: &str = "fairgrade_users";
pub const JOBS_KEY: &str = "fairgrade_jobs";
pub const QUEUE_KEY: &str = "fairgrade_queue";
pub const USER_JOBS_KEY: &str = "fairgrade_user_jobs";

/// Persistence for accounts, grading jobs and the pending-job queue.
#[async_trait]
pub trait GradingStore: Send + Sync {
    async fn get_user(&self, email: &str) -> StoreResult<Option<StoredUser>>;

    async fn save_user(&self, user: &StoredUser) -> StoreResult<()>;

    /// Append a job id to the owner's history in one step.
    async fn add_user_job(&self, email: &str, job_id: &str) -> StoreResult<()>;

    async fn remove_user_job(&self, email: &str, job_id: &str) -> StoreResult<()>;

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<GradingJob>>;

    async fn save_job(&self, job: &GradingJob) -> StoreResult<()>;

    /// Remove a job and any pending queue entry for it.
    async fn delete_job(&self, job_id: &str) -> StoreResult<()>;

    /// Push a job id onto the tail of the queue.
    async fn queue_job(&self, job_id: &str) -> StoreResult<()>;

    /// Pop the oldest queued job id.
    async fn pop_job(&self) -> StoreResult<Option<String>>;
}

pub type SharedStore = Arc<dyn GradingStore>;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;
use crate::errors::store::StoreResult;
use crate::models::{StoredUser, GradingJob};
use super::store::GradingStore;

#[derive(Default)]
struct Inner {
    users: HashMap<String, StoredUser>,
    jobs: HashMap<String, GradingJob>,
    queue: VecDeque<String>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GradingStore for MemoryStore {
    async fn get_user(&self, email: &str) -> StoreResult<Option<StoredUser>> {
        let inner = self.inner.lock().await;
        Ok(inner.users.get(&email.to_lowercase()).cloned())
    }

    async fn save_user(&self, user: &StoredUser) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.users.insert(user.email().to_lowercase(), user.clone());
        Ok(())
    }

    async fn add_user_job(&self, email: &str, job_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&email.to_lowercase()) {
            user.jobs.push(job_id.to_string());
        }
        Ok(())
    }

    async fn remove_user_job(&self, email: &str, job_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(user) = inner.users.get_mut(&email.to_lowercase()) {
            user.jobs.retain(|id| id != job_id);
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<GradingJob>> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(job_id).cloned())
    }

    async fn save_job(&self, job: &GradingJob) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.jobs.remove(job_id);
        inner.queue.retain(|id| id != job_id);
        Ok(())
    }

    async fn queue_job(&self, job_id: &str) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner.queue.push_back(job_id.to_string());
        Ok(())
    }

    async fn pop_job(&self) -> StoreResult<Option<String>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    fn user(email: &str) -> StoredUser {
        StoredUser {
            user: User {
                id: "u1".into(),
                name: "Ada".into(),
                email: email.into(),
            },
            password_hash: "hash".into(),
            jobs: Vec::new(),
        }
    }

    #[tokio::test]
    async fn users_are_looked_up_case_insensitively() {
        let store = MemoryStore::new();
        store.save_user(&user("Ada@Example.com")).await.unwrap();

        let found = store.get_user("ada@example.com").await.unwrap();
        assert_eq!(found.unwrap().user.name, "Ada");
        assert!(store.get_user("bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_job_appends_are_all_kept() {
        let store = MemoryStore::new();
        store.save_user(&user("ada@example.com")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.add_user_job("Ada@example.com", &format!("job-{}", i)).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        store.remove_user_job("ada@example.com", "job-3").await.unwrap();
        let jobs = store.get_user("ada@example.com").await.unwrap().unwrap().jobs;
        assert_eq!(jobs.len(), 15);
        assert!(!jobs.contains(&"job-3".to_string()));
    }

    #[tokio::test]
    async fn queue_pops_oldest_first() {
        let store = MemoryStore::new();
        store.queue_job("a").await.unwrap();
        store.queue_job("b").await.unwrap();
        store.queue_job("c").await.unwrap();

        assert_eq!(store.pop_job().await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.pop_job().await.unwrap().as_deref(), Some("b"));

        store.delete_job("c").await.unwrap();
        assert_eq!(store.pop_job().await.unwrap(), None);
    }
}

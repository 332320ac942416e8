use redis::{Client, AsyncCommands};
use std::sync::Arc;
use async_trait::async_trait;
use crate::errors::store::StoreResult;
use crate::models::{StoredUser, GradingJob};
use super::store::{GradingStore, USERS_KEY, JOBS_KEY, QUEUE_KEY, USER_JOBS_KEY};

#[derive(Clone)]
pub struct RedisService {
    client: Arc<Client>,
}

impl RedisService {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn user_key(email: &str) -> String {
        format!("{}:{}", USERS_KEY, email.to_lowercase())
    }

    // Job history lives in its own list so appends never rewrite the account
    fn user_jobs_key(email: &str) -> String {
        format!("{}:{}", USER_JOBS_KEY, email.to_lowercase())
    }

    fn job_key(job_id: &str) -> String {
        format!("{}:{}", JOBS_KEY, job_id)
    }
}

#[async_trait]
impl GradingStore for RedisService {
    async fn get_user(&self, email: &str) -> StoreResult<Option<StoredUser>> {
        let mut conn = self.client.get_async_connection().await?;
        let user_data: Option<String> = conn.get(Self::user_key(email)).await?;
        let mut user: StoredUser = match user_data {
            Some(data) => serde_json::from_str(&data)?,
            None => return Ok(None),
        };
        user.jobs = conn.lrange(Self::user_jobs_key(email), 0, -1).await?;
        Ok(Some(user))
    }

    async fn save_user(&self, user: &StoredUser) -> StoreResult<()> {
        let mut conn = self.client.get_async_connection().await?;
        let data = serde_json::to_string(user)?;
        let _: () = conn.set(Self::user_key(user.email()), data).await?;
        Ok(())
    }

    async fn add_user_job(&self, email: &str, job_id: &str) -> StoreResult<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.rpush(Self::user_jobs_key(email), job_id).await?;
        Ok(())
    }

    async fn remove_user_job(&self, email: &str, job_id: &str) -> StoreResult<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.lrem(Self::user_jobs_key(email), 0, job_id).await?;
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> StoreResult<Option<GradingJob>> {
        let mut conn = self.client.get_async_connection().await?;
        let job_data: Option<String> = conn.get(Self::job_key(job_id)).await?;
        Ok(job_data.map(|data| serde_json::from_str(&data)).transpose()?)
    }

    async fn save_job(&self, job: &GradingJob) -> StoreResult<()> {
        let mut conn = self.client.get_async_connection().await?;
        let data = serde_json::to_string(job)?;
        let _: () = conn.set(Self::job_key(&job.job_id), data).await?;
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> StoreResult<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(Self::job_key(job_id))
            .lrem(QUEUE_KEY, 0, job_id)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn queue_job(&self, job_id: &str) -> StoreResult<()> {
        let mut conn = self.client.get_async_connection().await?;
        let _: () = conn.lpush(QUEUE_KEY, job_id).await?;
        Ok(())
    }

    async fn pop_job(&self) -> StoreResult<Option<String>> {
        let mut conn = self.client.get_async_connection().await?;
        let job_id: Option<String> = conn.rpop(QUEUE_KEY, None).await?;
        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Needs a running server: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored
    fn service() -> RedisService {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        RedisService::new(Arc::new(Client::open(url).unwrap()))
    }

    #[tokio::test]
    #[ignore]
    async fn deleting_a_queued_job_unqueues_it() {
        let store = service();
        let job_id = format!("test-{}", uuid::Uuid::new_v4());
        store.queue_job(&job_id).await.unwrap();
        store.delete_job(&job_id).await.unwrap();

        let mut conn = store.client.get_async_connection().await.unwrap();
        let queued: Vec<String> = conn.lrange(QUEUE_KEY, 0, -1).await.unwrap();
        assert!(!queued.contains(&job_id));
    }

    #[tokio::test]
    #[ignore]
    async fn user_job_history_is_a_list() {
        let store = service();
        let email = format!("{}@example.com", uuid::Uuid::new_v4().simple());
        store
            .save_user(&StoredUser {
                user: crate::models::User {
                    id: "u1".into(),
                    name: "Ada".into(),
                    email: email.clone(),
                },
                password_hash: "hash".into(),
                jobs: Vec::new(),
            })
            .await
            .unwrap();

        store.add_user_job(&email, "a").await.unwrap();
        store.add_user_job(&email, "b").await.unwrap();
        store.remove_user_job(&email, "a").await.unwrap();

        let user = store.get_user(&email).await.unwrap().unwrap();
        assert_eq!(user.jobs, vec!["b".to_string()]);

        let mut conn = store.client.get_async_connection().await.unwrap();
        let _: () = conn
            .del(vec![RedisService::user_key(&email), RedisService::user_jobs_key(&email)])
            .await
            .unwrap();
    }
}

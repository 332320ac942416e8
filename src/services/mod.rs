mod store;
mod redis_service;
mod memory_store;

pub use store::{GradingStore, SharedStore, USERS_KEY, JOBS_KEY, QUEUE_KEY, USER_JOBS_KEY};
pub use redis_service::RedisService;
pub use memory_store::MemoryStore;

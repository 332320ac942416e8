mod worker;
pub mod report;

pub use worker::{worker_process, process_job, WorkerContext};

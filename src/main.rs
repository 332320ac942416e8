use std::sync::Arc;
use anyhow::Context;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;
use fairgrade::config::Config;
use fairgrade::worker::{worker_process, WorkerContext};
use fairgrade::{build_grader, build_router, connect_store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    let store = connect_store(&config).context("Failed to open store")?;

    let worker_ctx = WorkerContext {
        store: store.clone(),
        grader: Arc::new(build_grader(&config)),
        job_timeout_secs: config.worker.job_timeout_secs,
    };
    let semaphore = Arc::new(Semaphore::new(config.worker.max_concurrent_jobs));

    for _ in 0..config.worker.worker_count {
        let ctx = worker_ctx.clone();
        let semaphore_worker = semaphore.clone();
        tokio::spawn(async move {
            worker_process(ctx, semaphore_worker).await;
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(store, config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("FairGrade listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;
    Ok(())
}

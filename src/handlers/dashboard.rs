use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Response, Redirect},
};
use tower_sessions::Session;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::middleware::current_user;
use crate::models::{GradingJob, JobStatus};
use crate::services::SharedStore;
use super::grading::owned_job;
use super::{escape_html, fill_template, render_template};

pub async fn serve_user_dashboard(
    State((store, _)): State<(SharedStore, Config)>,
    session: Session,
) -> AppResult<Response> {
    let user = current_user(&session).await?;
    tracing::info!("Accessing dashboard for {}", user.email);

    let stored = store
        .get_user(&user.email)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".into()))?;

    let mut jobs = Vec::new();
    for job_id in &stored.jobs {
        match store.get_job(job_id).await {
            Ok(Some(job)) => jobs.push(job),
            Ok(None) => tracing::warn!("Job {} not found for {}", job_id, user.email),
            Err(e) => tracing::error!("Failed to fetch job {}: {}", job_id, e),
        }
    }

    // Newest first
    jobs.sort_by(|a, b| b.submission_time.cmp(&a.submission_time));

    let graded_files: usize = jobs.iter().map(|j| j.results.len()).sum();
    let scores: Vec<f64> = jobs
        .iter()
        .flat_map(|j| j.results.iter().map(|r| r.score))
        .collect();
    let overall_average = if scores.is_empty() {
        "-".to_string()
    } else {
        format!("{:.1}", scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let jobs_html = if jobs.is_empty() {
        r#"<tr><td colspan="7" class="empty">No exams graded yet. <a href="/upload">Grade your first exam</a>.</td></tr>"#.to_string()
    } else {
        jobs.iter().map(render_job_row).collect::<Vec<_>>().join("\n")
    };

    let dashboard_html = fill_template(
        &render_template("user_dashboard.html")?,
        &[
            ("username", escape_html(&user.name)),
            ("email", escape_html(&user.email)),
            ("jobs", jobs_html),
            ("job_count", jobs.len().to_string()),
            ("graded_files", graded_files.to_string()),
            ("overall_average", overall_average),
        ],
    );

    tracing::debug!("Rendered dashboard for {} with {} jobs", user.email, jobs.len());
    Ok(Html(dashboard_html).into_response())
}

fn render_job_row(job: &GradingJob) -> String {
    let download = if job.status == JobStatus::Completed {
        format!(r#"<a href="/download/{}" class="download-btn">CSV</a>"#, job.job_id)
    } else {
        String::new()
    };

    format!(
        r#"<tr>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td class="status-{}">{:?}</td>
                <td>{}</td>
                <td class="action-cell">
                    <a href="/results/{}" class="view-btn">View</a>
                    {}
                    <a href="/delete/{}" class="delete-btn">Delete</a>
                </td>
            </tr>"#,
        escape_html(&job.exam_title),
        escape_html(&job.subject),
        job.files.len(),
        job.submission_time.format("%Y-%m-%d %H:%M:%S"),
        format!("{:?}", job.status).to_lowercase(),
        job.status,
        job.class_average().map_or("-".to_string(), |a| format!("{:.1}", a)),
        job.job_id,
        download,
        job.job_id
    )
}

pub async fn delete_job(
    State((store, _)): State<(SharedStore, Config)>,
    session: Session,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let user = current_user(&session).await?;
    tracing::info!("Deleting job {} for {}", job_id, user.email);

    let job = owned_job(&store, &job_id, &user).await?;

    store.remove_user_job(&user.email, &job_id).await?;

    match tokio::fs::remove_dir_all(&job.result_path).await {
        Ok(()) => tracing::debug!("Removed result directory {}", job.result_path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("Failed to delete result directory {}: {}", job.result_path, e);
            return Err(AppError::File(e));
        }
    }

    // Uploads linger only for jobs that never reached a worker
    for file in &job.files {
        let _ = tokio::fs::remove_file(&file.path).await;
    }

    store.delete_job(&job_id).await?;

    tracing::info!("Deleted job {} for {}", job_id, user.email);
    Ok(Redirect::to("/user").into_response())
}

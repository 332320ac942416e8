use axum::{
    extract::{Multipart, State, Path, multipart::Field},
    response::{Html, IntoResponse, Response, Json, Redirect},
    http::{StatusCode, header},
    body::Body,
};
use tower_sessions::Session;
use std::path::Path as FilePath;
use chrono::Utc;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufReader, BufWriter},
};
use tokio_util::io::ReaderStream;
use serde_json::json;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::grading::{parse_rubric, Subject, SUBJECTS};
use crate::middleware::current_user;
use crate::models::{Criterion, GradingJob, JobStatus, StudentFile, SubmissionForm, User};
use crate::services::SharedStore;
use crate::worker::report::REPORT_CSV;
use super::{escape_html, fill_template, render_template};

const UPLOAD_PAGE: &str = "/upload";

pub async fn serve_upload_page(session: Session) -> AppResult<Response> {
    let user = current_user(&session).await?;
    tracing::info!("Serving upload page for {}", user.email);

    let options = SUBJECTS
        .iter()
        .map(|s| {
            format!(
                r#"<option value="{}" data-rubric="{}">{}</option>"#,
                s.id,
                escape_html(s.rubric),
                s.label
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let html = fill_template(
        &render_template("upload.html")?,
        &[("username", escape_html(&user.name)), ("subjects", options)],
    );
    Ok(Html(html).into_response())
}

// Form data gathered while walking the multipart stream
#[derive(Default)]
struct UploadData {
    files: Vec<StudentFile>,
    form: SubmissionForm,
}

pub async fn submit_grading(
    State((store, config)): State<(SharedStore, Config)>,
    session: Session,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let user = current_user(&session).await?;

    let upload_data = process_multipart_form(&mut multipart, &user, &config).await?;

    let criteria = match validate_submission(&upload_data) {
        Ok(criteria) => criteria,
        Err(e) => {
            discard_uploads(&upload_data.files).await;
            return Err(e);
        }
    };

    let job_id = create_and_queue_job(&store, &config, &user, upload_data, criteria).await?;
    Ok(Redirect::to(&format!("/results/{}", job_id)).into_response())
}

// Walks the multipart stream, saving every answer file under the upload dir
async fn process_multipart_form(
    multipart: &mut Multipart,
    user: &User,
    config: &Config,
) -> AppResult<UploadData> {
    tracing::debug!("Processing grading form for {}", user.email);
    let mut data = UploadData::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read multipart field: {}", e);
                discard_uploads(&data.files).await;
                return Err(AppError::Upload(format!("Failed to process form field: {}", e)));
            }
        };

        let name = field.name().unwrap_or("").to_string();
        let result = match name.as_str() {
            "files" => handle_file_upload(field, user, config).await.map(|saved| {
                if let Some(file) = saved {
                    tracing::debug!("Saved upload {} -> {}", file.filename, file.path);
                    data.files.push(file);
                }
            }),
            "exam_title" => read_text(field).await.map(|v| data.form.exam_title = v.trim().to_string()),
            "subject" => read_text(field).await.map(|v| data.form.subject = v.trim().to_string()),
            "rubric" => read_text(field).await.map(|v| data.form.rubric = v),
            "use_ocr" => parse_checkbox(field).await.map(|v| data.form.use_ocr = v),
            field_name => {
                tracing::warn!("Unexpected form field: {}", field_name);
                Ok(())
            }
        };

        if let Err(e) = result {
            discard_uploads(&data.files).await;
            return Err(e);
        }
    }

    Ok(data)
}

/// Checks the form and resolves the rubric into criteria.
fn validate_submission(data: &UploadData) -> AppResult<Vec<Criterion>> {
    if data.files.is_empty() {
        return Err(AppError::validation(UPLOAD_PAGE, "Please upload at least one answer file"));
    }

    let rubric_text = if !data.form.rubric.trim().is_empty() {
        data.form.rubric.as_str()
    } else {
        match Subject::find(&data.form.subject) {
            Some(subject) => subject.rubric,
            None => {
                return Err(AppError::validation(
                    UPLOAD_PAGE,
                    "Please choose a subject or enter a rubric",
                ))
            }
        }
    };

    let criteria = parse_rubric(rubric_text);
    if criteria.is_empty() {
        return Err(AppError::validation(
            UPLOAD_PAGE,
            "The rubric has no criteria. Write one per line, e.g. \"Accuracy (40%)\"",
        ));
    }
    Ok(criteria)
}

async fn handle_file_upload(
    mut field: Field<'_>,
    user: &User,
    config: &Config,
) -> AppResult<Option<StudentFile>> {
    // Browsers send an empty part when no file was picked
    let filename = match field.file_name().map(sanitize_filename) {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(None),
    };
    let mime_type = field
        .content_type()
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .unwrap_or_else(|| guess_mime_type(&filename).to_string());

    let path = create_upload_path(config, user, &filename).await?;
    let written = match save_uploaded_file(&mut field, &path).await {
        Ok(written) => written,
        Err(e) => {
            // A stream that broke mid-file leaves a partial copy behind
            if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove partial upload {}: {}", path, remove_err);
            }
            return Err(e);
        }
    };
    if written == 0 {
        tracing::warn!("Ignoring empty upload {}", filename);
        let _ = tokio::fs::remove_file(&path).await;
        return Ok(None);
    }

    Ok(Some(StudentFile {
        filename,
        path,
        mime_type,
    }))
}

fn sanitize_filename(raw: &str) -> String {
    FilePath::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .trim()
        .to_string()
}

pub(crate) fn guess_mime_type(filename: &str) -> &'static str {
    let extension = FilePath::new(filename)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("bmp") => "image/bmp",
        Some("pdf") => "application/pdf",
        Some("txt") | Some("md") => "text/plain",
        _ => "application/octet-stream",
    }
}

// Per-user upload directory; names are prefixed to avoid collisions
async fn create_upload_path(config: &Config, user: &User, filename: &str) -> AppResult<String> {
    let user_dir = format!("{}/{}", config.upload.temp_dir, user.id);
    tokio::fs::create_dir_all(&user_dir).await.map_err(|e| {
        tracing::error!("Failed to create upload directory {}: {}", user_dir, e);
        AppError::File(e)
    })?;

    let unique = uuid::Uuid::new_v4().simple().to_string();
    Ok(format!("{}/{}_{}_{}", user_dir, Utc::now().timestamp(), &unique[..8], filename))
}

async fn save_uploaded_file(field: &mut Field<'_>, path: &str) -> AppResult<u64> {
    let file = File::create(path).await.map_err(|e| {
        tracing::error!("Failed to create file {}: {}", path, e);
        AppError::File(e)
    })?;
    let mut writer = BufWriter::new(file);
    let mut written = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Upload(format!("Failed to read upload: {}", e)))?
    {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    Ok(written)
}

async fn discard_uploads(files: &[StudentFile]) {
    for file in files {
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            tracing::warn!("Failed to discard upload {}: {}", file.path, e);
        }
    }
}

async fn read_text(field: Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Upload(format!("Failed to read field: {}", e)))
}

// HTML checkboxes submit "on"; absent means unchecked
async fn parse_checkbox(field: Field<'_>) -> AppResult<bool> {
    let value = read_text(field).await?;
    match value.trim() {
        "on" | "true" | "1" => Ok(true),
        "" | "off" | "false" | "0" => Ok(false),
        other => Err(AppError::Upload(format!("Invalid checkbox value '{}'", other))),
    }
}

async fn create_and_queue_job(
    store: &SharedStore,
    config: &Config,
    user: &User,
    upload_data: UploadData,
    criteria: Vec<Criterion>,
) -> AppResult<String> {
    let job_id = uuid::Uuid::new_v4().to_string();
    let form = upload_data.form;

    let subject = Subject::find(&form.subject)
        .map(|s| s.label.to_string())
        .unwrap_or_else(|| {
            if form.subject.is_empty() { "General".to_string() } else { form.subject.clone() }
        });
    let exam_title = if form.exam_title.is_empty() {
        format!("{} exam", subject)
    } else {
        form.exam_title
    };

    let job = GradingJob {
        job_id: job_id.clone(),
        owner: user.email.clone(),
        exam_title,
        subject,
        criteria,
        use_ocr: form.use_ocr,
        files: upload_data.files,
        status: JobStatus::Queued,
        results: Vec::new(),
        error: None,
        result_path: format!("{}/{}/{}", config.upload.results_dir, user.id, job_id),
        submission_time: Utc::now(),
        completion_time: None,
    };

    store.save_job(&job).await?;
    store.add_user_job(&user.email, &job_id).await?;
    store.queue_job(&job_id).await?;

    tracing::info!(
        "Queued job {} for {}: {} files, {} criteria",
        job_id,
        user.email,
        job.files.len(),
        job.criteria.len()
    );
    Ok(job_id)
}

/// Loads a job, treating someone else's job as missing.
pub(crate) async fn owned_job(store: &SharedStore, job_id: &str, user: &User) -> AppResult<GradingJob> {
    match store.get_job(job_id).await? {
        Some(job) if job.owner == user.email => Ok(job),
        _ => {
            tracing::warn!("Job {} not found for {}", job_id, user.email);
            Err(AppError::Job(format!("Job {} not found", job_id)))
        }
    }
}

pub async fn get_job_status(
    State((store, _)): State<(SharedStore, Config)>,
    session: Session,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let user = current_user(&session).await?;
    let job = owned_job(&store, &job_id, &user).await?;

    tracing::debug!("Job {} status: {:?}", job_id, job.status);
    let response = json!({
        "job_id": job.job_id,
        "status": job.status,
        "files": job.files.len(),
        "graded": job.results.len(),
        "average": job.class_average(),
        "error": job.error,
        "submit_time": job.submission_time,
        "complete_time": job.completion_time,
    });
    Ok(Json(response).into_response())
}

pub async fn view_results(
    State((store, _)): State<(SharedStore, Config)>,
    session: Session,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let user = current_user(&session).await?;
    let job = owned_job(&store, &job_id, &user).await?;

    if !job.status.is_finished() {
        let html = fill_template(
            &render_template("processing.html")?,
            &[
                ("job_id", job.job_id.clone()),
                ("exam_title", escape_html(&job.exam_title)),
                ("file_count", job.files.len().to_string()),
            ],
        );
        return Ok(Html(html).into_response());
    }

    let html = fill_template(
        &render_template("results.html")?,
        &[
            ("job_id", job.job_id.clone()),
            ("exam_title", escape_html(&job.exam_title)),
            ("subject", escape_html(&job.subject)),
            ("status", format!("{:?}", job.status)),
            ("average", job.class_average().map_or("-".to_string(), |a| format!("{:.1}", a))),
            ("error", job.error.as_deref().map(escape_html).unwrap_or_default()),
            ("results", render_results(&job)),
        ],
    );

    tracing::info!("Rendered results for job {}", job_id);
    Ok(Html(html).into_response())
}

fn render_results(job: &GradingJob) -> String {
    job.results
        .iter()
        .map(|result| {
            let rows = result
                .criteria
                .iter()
                .map(|c| {
                    format!(
                        r#"<tr{}><td>{}</td><td>{}%</td><td>{:.1} / {}</td><td>{}</td></tr>"#,
                        if c.fallback { r#" class="provisional""# } else { "" },
                        escape_html(&c.name),
                        c.weight,
                        c.score,
                        c.max_score,
                        escape_html(&c.feedback)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            format!(
                r#"<section class="result-card" id="result-{}">
                <h2>{}</h2>
                <p class="total-score">{:.1} / 100</p>
                <table>
                    <thead><tr><th>Criterion</th><th>Weight</th><th>Score</th><th>Feedback</th></tr></thead>
                    <tbody>{}</tbody>
                </table>
            </section>"#,
                escape_html(&result.id),
                escape_html(&result.name),
                result.score,
                rows
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn download_report(
    State((store, _)): State<(SharedStore, Config)>,
    session: Session,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let user = current_user(&session).await?;
    let job = owned_job(&store, &job_id, &user).await?;

    let report_path = FilePath::new(&job.result_path).join(REPORT_CSV);
    let file = File::open(&report_path).await.map_err(|e| {
        tracing::error!("Failed to open report {}: {}", report_path.display(), e);
        AppError::File(e)
    })?;
    let file_size = file.metadata().await?.len();

    let body = Body::from_stream(ReaderStream::new(BufReader::new(file)));
    let filename = format!("{}_results.csv", sanitize_download_name(&job.exam_title));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename))
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .body(body)
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            AppError::Job(format!("Failed to build download response: {}", e))
        })?;

    tracing::info!("Sending report for job {} ({} bytes)", job_id, file_size);
    Ok(response)
}

fn sanitize_download_name(title: &str) -> String {
    let name: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() { "exam".to_string() } else { name }
}

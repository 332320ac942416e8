use std::path::{Path, PathBuf};
use crate::errors::{GradingError, GradingOutcome};
use crate::models::GradingJob;

pub const REPORT_JSON: &str = "report.json";
pub const REPORT_CSV: &str = "report.csv";

/// One row per graded criterion plus a `TOTAL` row per file.
pub fn render_csv(job: &GradingJob) -> GradingOutcome<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["file", "result_id", "criterion", "weight", "score", "max_score", "provisional", "feedback"])
        .map_err(csv_error)?;

    for result in &job.results {
        for criterion in &result.criteria {
            let weight = criterion.weight.to_string();
            let score = format!("{:.2}", criterion.score);
            let max_score = criterion.max_score.to_string();
            writer
                .write_record([
                    result.name.as_str(),
                    result.id.as_str(),
                    criterion.name.as_str(),
                    weight.as_str(),
                    score.as_str(),
                    max_score.as_str(),
                    if criterion.fallback { "yes" } else { "no" },
                    criterion.feedback.as_str(),
                ])
                .map_err(csv_error)?;
        }
        let total = format!("{:.2}", result.score);
        writer
            .write_record([
                result.name.as_str(),
                result.id.as_str(),
                "TOTAL",
                "",
                total.as_str(),
                "100",
                "",
                "",
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| GradingError::Processing(format!("Failed to finish CSV report: {}", e)))
}

fn csv_error(e: csv::Error) -> GradingError {
    GradingError::Processing(format!("Failed to write CSV report: {}", e))
}

/// Writes the JSON and CSV reports into the job's result directory.
pub async fn write_reports(job: &GradingJob) -> GradingOutcome<PathBuf> {
    let dir = Path::new(&job.result_path);
    tokio::fs::create_dir_all(dir).await?;

    let json = serde_json::to_vec_pretty(job)
        .map_err(|e| GradingError::Processing(format!("Failed to serialise report: {}", e)))?;
    tokio::fs::write(dir.join(REPORT_JSON), json).await?;

    let csv_path = dir.join(REPORT_CSV);
    tokio::fs::write(&csv_path, render_csv(job)?).await?;

    tracing::info!("Wrote reports for job {} to {}", job.job_id, dir.display());
    Ok(csv_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::{CriterionResult, GradingResult, JobStatus};

    fn job(result_path: &str) -> GradingJob {
        GradingJob {
            job_id: "job-1".into(),
            owner: "t@example.com".into(),
            exam_title: "Midterm".into(),
            subject: "Physics".into(),
            criteria: Vec::new(),
            use_ocr: false,
            files: Vec::new(),
            status: JobStatus::Completed,
            results: vec![GradingResult {
                id: "1-abc".into(),
                name: "alice.png".into(),
                score: 82.5,
                feedback: String::new(),
                criteria: vec![CriterionResult {
                    name: "Units, notation".into(),
                    weight: 25.0,
                    score: 82.5,
                    max_score: 100.0,
                    feedback: "Mostly \"right\"".into(),
                    fallback: false,
                }],
            }],
            error: None,
            result_path: result_path.into(),
            submission_time: Utc::now(),
            completion_time: Some(Utc::now()),
        }
    }

    #[test]
    fn csv_quotes_and_totals() {
        let csv = String::from_utf8(render_csv(&job("unused")).unwrap()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("file,result_id,criterion"));
        assert_eq!(
            lines[1],
            r#"alice.png,1-abc,"Units, notation",25,82.50,100,no,"Mostly ""right""""#
        );
        assert_eq!(lines[2], "alice.png,1-abc,TOTAL,,82.50,100,,");
    }

    #[tokio::test]
    async fn reports_land_in_result_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result_path = dir.path().join("midterm");
        let job = job(result_path.to_str().unwrap());

        let csv_path = write_reports(&job).await.unwrap();
        assert!(csv_path.ends_with(REPORT_CSV));

        let json = std::fs::read_to_string(result_path.join(REPORT_JSON)).unwrap();
        let parsed: GradingJob = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.results[0].score, 82.5);
    }
}

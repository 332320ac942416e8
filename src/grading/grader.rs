use std::sync::Arc;
use bytes::Bytes;
use futures::future::join_all;
use tracing::{debug, info, warn};
use crate::models::{Criterion, CriterionResult, GradingResult};
use super::client::{Attachment, ScoringModel, ScoringRequest};
use super::ocr::{is_image, OcrEngine};
use super::scoring::{fallback_score, parse_feedback, parse_score, weighted_total};

/// An answer sheet read into memory, ready to send.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// What the model is shown for one file: text, the raw file, or both.
struct AnswerContent {
    text: Option<String>,
    attachment: Option<Attachment>,
}

pub struct Grader {
    model: Arc<dyn ScoringModel>,
    ocr: Option<Arc<dyn OcrEngine>>,
    max_score: f64,
}

impl Grader {
    pub fn new(model: Arc<dyn ScoringModel>, max_score: f64) -> Self {
        Self {
            model,
            ocr: None,
            max_score,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Grades files one after another, in upload order.
    pub async fn grade_submission(
        &self,
        subject: &str,
        files: &[LoadedFile],
        criteria: &[Criterion],
        use_ocr: bool,
    ) -> Vec<GradingResult> {
        let mut results = Vec::with_capacity(files.len());
        for file in files {
            results.push(self.grade_file(subject, file, criteria, use_ocr).await);
        }
        results
    }

    /// Scores every criterion for one file at once and folds them into a total.
    pub async fn grade_file(
        &self,
        subject: &str,
        file: &LoadedFile,
        criteria: &[Criterion],
        use_ocr: bool,
    ) -> GradingResult {
        info!("Grading {} against {} criteria", file.name, criteria.len());
        let content = self.prepare_content(file, use_ocr).await;

        let scored = join_all(
            criteria
                .iter()
                .map(|criterion| self.grade_criterion(subject, criterion, &content)),
        )
        .await;

        let score = weighted_total(&scored);
        let feedback = summarize(&scored);
        debug!("{} scored {:.2}", file.name, score);

        GradingResult {
            id: GradingResult::new_id(),
            name: file.name.clone(),
            score,
            feedback,
            criteria: scored,
        }
    }

    async fn prepare_content(&self, file: &LoadedFile, use_ocr: bool) -> AnswerContent {
        if file.mime_type.starts_with("text/") {
            return AnswerContent {
                text: Some(String::from_utf8_lossy(&file.data).into_owned()),
                attachment: None,
            };
        }

        let mut text = None;
        if use_ocr && is_image(&file.mime_type) {
            match &self.ocr {
                Some(ocr) => match ocr.extract_text(&file.data, &file.mime_type).await {
                    Ok(extracted) if !extracted.is_empty() => text = Some(extracted),
                    Ok(_) => warn!("OCR found no text in {}", file.name),
                    Err(e) => warn!("OCR failed for {}: {:#}", file.name, e),
                },
                None => debug!("OCR requested but no engine is configured"),
            }
        }

        AnswerContent {
            text,
            attachment: Some(Attachment {
                mime_type: file.mime_type.clone(),
                data: file.data.clone(),
            }),
        }
    }

    async fn grade_criterion(
        &self,
        subject: &str,
        criterion: &Criterion,
        content: &AnswerContent,
    ) -> CriterionResult {
        let request = ScoringRequest {
            prompt: build_prompt(subject, criterion, self.max_score, content.text.as_deref()),
            attachment: content.attachment.clone(),
        };

        let reply = match self.model.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("{} call for '{}' failed: {:#}", self.model.name(), criterion.name, e);
                return self.fallback(criterion, format!("Automatic grading failed ({}).", e));
            }
        };

        match parse_score(&reply, self.max_score) {
            Some(score) => CriterionResult {
                name: criterion.name.clone(),
                weight: criterion.weight,
                score,
                max_score: self.max_score,
                feedback: parse_feedback(&reply),
                fallback: false,
            },
            None => {
                warn!("No score in reply for '{}'", criterion.name);
                self.fallback(criterion, "The grader's reply contained no score.".to_string())
            }
        }
    }

    fn fallback(&self, criterion: &Criterion, reason: String) -> CriterionResult {
        CriterionResult {
            name: criterion.name.clone(),
            weight: criterion.weight,
            score: fallback_score(self.max_score),
            max_score: self.max_score,
            feedback: format!("{} A provisional score was assigned; please review manually.", reason),
            fallback: true,
        }
    }
}

pub fn build_prompt(
    subject: &str,
    criterion: &Criterion,
    max_score: f64,
    answer_text: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You are grading a student's {subject} exam answer.\n\
         Evaluate it only on this criterion: \"{name}\" (worth {weight}% of the grade).\n\
         Give a score from 0 to {max}.\n\
         Reply exactly in this format:\n\
         Score: <number>/{max}\n\
         Feedback: <two or three sentences for the student>\n",
        subject = subject,
        name = criterion.name,
        weight = criterion.weight,
        max = max_score,
    );

    match answer_text {
        Some(text) => {
            prompt.push_str("\nStudent answer (extracted text):\n");
            prompt.push_str(text);
            prompt.push('\n');
        }
        None => prompt.push_str("\nThe student's answer is attached.\n"),
    }
    prompt
}

fn summarize(criteria: &[CriterionResult]) -> String {
    let mut lines: Vec<String> = criteria
        .iter()
        .map(|c| format!("{} ({:.0}/{:.0}): {}", c.name, c.score, c.max_score, c.feedback))
        .collect();

    let fallbacks = criteria.iter().filter(|c| c.fallback).count();
    if fallbacks > 0 {
        lines.push(format!("{} criteria received a provisional score.", fallbacks));
    }
    lines.join("\n")
}

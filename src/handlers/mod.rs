mod auth;
mod grading;
mod dashboard;

pub use auth::{serve_login_page, handle_login, handle_register, handle_logout};
pub use grading::{serve_upload_page, submit_grading, get_job_status, view_results, download_report};
pub use dashboard::{serve_user_dashboard, delete_job};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use crate::errors::{AppError, AppResult};

const TEMPLATE_DIR: &str = "templates";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid")
});

pub(crate) fn render_template(name: &str) -> AppResult<String> {
    let path = format!("{}/{}", TEMPLATE_DIR, name);
    std::fs::read_to_string(&path).map_err(|e| {
        tracing::error!("Failed to read template {}: {}", path, e);
        AppError::File(e)
    })
}

/// Fills `{{name}}` placeholders in a single pass.
///
/// Inserted values are never scanned again, so user text that looks like a
/// placeholder stays literal. Unknown placeholders are left as they are.
pub(crate) fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            values
                .iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Escapes text that is interpolated into HTML templates.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

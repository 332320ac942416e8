use std::io::Write;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use crate::config::OcrConfig;

/// Turns a scanned page into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, image: &[u8], mime_type: &str) -> Result<String>;
}

/// Runs the `tesseract` binary on a temporary copy of the image.
pub struct TesseractCli {
    command: String,
    language: String,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
        }
    }
}

pub fn is_image(mime_type: &str) -> bool {
    mime_type.starts_with("image/")
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => ".png",
        "image/jpeg" | "image/jpg" => ".jpg",
        "image/tiff" => ".tif",
        "image/bmp" => ".bmp",
        "image/webp" => ".webp",
        _ => ".img",
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn extract_text(&self, image: &[u8], mime_type: &str) -> Result<String> {
        if !is_image(mime_type) {
            bail!("OCR only handles images, got {}", mime_type);
        }

        let mut scratch = tempfile::Builder::new()
            .prefix("fairgrade-ocr-")
            .suffix(extension_for(mime_type))
            .tempfile()
            .context("Failed to create OCR scratch file")?;
        scratch.write_all(image)?;
        scratch.flush()?;

        // Output base "stdout" makes tesseract print instead of writing a file
        let output = tokio::process::Command::new(&self.command)
            .arg(scratch.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", self.command))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!("OCR extracted {} characters", text.len());
        Ok(text)
    }
}

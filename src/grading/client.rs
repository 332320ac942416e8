use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::GeminiConfig;

/// Raw file bytes sent alongside the prompt.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ScoringRequest {
    pub prompt: String,
    pub attachment: Option<Attachment>,
}

/// A text-completion backend that can score one criterion of one answer.
#[async_trait]
pub trait ScoringModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ScoringRequest) -> Result<String>;
}

/// Client for the `generateContent` endpoint. The key goes in the query string.
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

#[async_trait]
impl ScoringModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &ScoringRequest) -> Result<String> {
        if self.config.api_key.is_empty() {
            bail!("Gemini API key is not configured");
        }

        let mut parts = vec![Part::Text { text: &request.prompt }];
        if let Some(attachment) = &request.attachment {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: &attachment.mime_type,
                    data: STANDARD.encode(&attachment.data),
                },
            });
        }

        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        debug!("Sending scoring request ({} prompt chars)", request.prompt.len());
        let resp = self
            .client
            .post(&self.config.api_url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            bail!("Gemini error {}: {}", status, resp.text().await.unwrap_or_default());
        }

        let parsed: GenerateResponse = resp.json().await.context("Unreadable Gemini response")?;
        parsed
            .first_text()
            .context("Gemini response had no text candidate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialises_to_wire_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "grade this" },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: STANDARD.encode(b"png"),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 256,
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "grade this");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "cG5n");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn reads_first_candidate_text() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Score: 9/10"}],"role":"model"}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("Score: 9/10"));

        let blocked: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(blocked.first_text().is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_before_sending() {
        let client = GeminiClient::new(GeminiConfig {
            api_url: "http://127.0.0.1:9/unused".into(),
            api_key: String::new(),
            temperature: 0.0,
            max_output_tokens: 16,
        });
        let request = ScoringRequest {
            prompt: "x".into(),
            attachment: None,
        };
        let err = client.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}

//! Google Gemini `generateContent` client.
//!
//! Blocking on purpose: every intake unit of work already runs on a
//! blocking thread next to its SQLite connection.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::llm::{ContentBlock, LlmClient, LlmPart, LlmRequest, LlmRole, ModelReply};
use super::IntakeError;

pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Upstream error bodies are cut to this many characters before logging or returning.
const MAX_ERROR_BODY_CHARS: usize = 200;

pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, IntakeError> {
        if api_key.trim().is_empty() {
            return Err(IntakeError::NotConfigured(
                "Gemini API key is required".into(),
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| IntakeError::UpstreamConnection(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            endpoint: GEMINI_ENDPOINT.to_string(),
            timeout_secs,
        })
    }

    /// Point the client at a different base URL (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn build_request_body(request: &LlmRequest) -> GenerateContentRequest {
        let engine = base64::engine::general_purpose::STANDARD;
        GenerateContentRequest {
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text { text: s.clone() }],
            }),
            contents: request
                .messages
                .iter()
                .map(|m| GeminiContent {
                    role: Some(match m.role {
                        LlmRole::User => "user".to_string(),
                        LlmRole::Model => "model".to_string(),
                    }),
                    parts: m
                        .parts
                        .iter()
                        .map(|p| match p {
                            LlmPart::Text(text) => GeminiPart::Text { text: text.clone() },
                            LlmPart::Image { mime_type, data } => GeminiPart::InlineData {
                                inline_data: GeminiInlineData {
                                    mime_type: mime_type.clone(),
                                    data: engine.encode(data),
                                },
                            },
                        })
                        .collect(),
                })
                .collect(),
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }

    /// Text parts of the first candidate. Several parts become content blocks.
    pub fn extract_reply(response: GenerateContentResponse) -> Result<ModelReply, IntakeError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| IntakeError::MalformedResponse("no candidates returned".into()))?;

        let mut texts: Vec<String> = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        match texts.len() {
            0 => Err(IntakeError::MalformedResponse(format!(
                "candidate has no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))),
            1 => Ok(ModelReply::from_raw(texts.remove(0))),
            _ => Ok(ModelReply::Blocks(
                texts.iter().map(|t| ContentBlock::text(t)).collect(),
            )),
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> IntakeError {
        if e.is_timeout() {
            IntakeError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            IntakeError::UpstreamConnection(self.endpoint.clone())
        } else {
            IntakeError::UpstreamConnection(e.to_string())
        }
    }
}

impl LlmClient for GeminiClient {
    fn generate(&self, request: &LlmRequest) -> Result<ModelReply, IntakeError> {
        let _span = tracing::info_span!(
            "gemini_generate",
            model = %request.model,
            messages = request.messages.len()
        )
        .entered();

        let url = format!("{}/{}:generateContent", self.endpoint, request.model);
        let body = Self::build_request_body(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().unwrap_or_default();
            let truncated: String = error_body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(status = status.as_u16(), "Gemini request failed");
            return Err(IntakeError::UpstreamStatus {
                status: status.as_u16(),
                body: truncated,
            });
        }

        let parsed: GenerateContentResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                IntakeError::Timeout(self.timeout_secs)
            } else {
                IntakeError::MalformedResponse(e.to_string())
            }
        })?;

        Self::extract_reply(parsed)
    }
}

// -- Wire types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

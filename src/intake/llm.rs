use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::IntakeError;

/// Default chat model for the intake conversation.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-flash-latest";
/// Default model for visit and history summaries.
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-flash-latest";
/// Default vision-capable model for scan analysis.
pub const DEFAULT_VISION_MODEL: &str = "gemini-2.5-flash-lite";

pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const SUMMARY_TEMPERATURE: f32 = 0.2;
pub const HISTORY_TEMPERATURE: f32 = 0.4;
pub const VISION_TEMPERATURE: f32 = 0.2;

/// Which model serves which intake task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub chat_model: String,
    pub summary_model: String,
    pub vision_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LlmPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub parts: Vec<LlmPart>,
}

impl LlmMessage {
    pub fn user(text: &str) -> Self {
        Self {
            role: LlmRole::User,
            parts: vec![LlmPart::Text(text.to_string())],
        }
    }

    pub fn model(text: &str) -> Self {
        Self {
            role: LlmRole::Model,
            parts: vec![LlmPart::Text(text.to_string())],
        }
    }

    /// All text parts joined, images skipped.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                LlmPart::Text(t) => Some(t.as_str()),
                LlmPart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single generation call: model, optional system instruction, turns.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub temperature: f32,
}

impl LlmRequest {
    pub fn new(model: &str, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            system: None,
            messages: Vec::new(),
            temperature,
        }
    }

    pub fn with_system(mut self, system: String) -> Self {
        self.system = Some(system);
        self
    }

    pub fn with_message(mut self, message: LlmMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// One element of a block-structured reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: &str) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.to_string()),
        }
    }

    /// An object with a string `type`. A non-string `text` counts as absent.
    fn from_value(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let kind = object.get("type")?.as_str()?;
        Some(Self {
            kind: kind.to_string(),
            text: object
                .get("text")
                .and_then(|t| t.as_str())
                .map(str::to_string),
        })
    }
}

/// Model output as received: plain text, or a list of typed content blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl ModelReply {
    /// Classify raw output. A JSON list holding at least one typed object
    /// becomes `Blocks`; list items that are not typed objects are dropped.
    /// Anything else stays `Text`.
    pub fn from_raw(raw: String) -> Self {
        let trimmed = raw.trim();
        if !trimmed.starts_with('[') {
            return Self::Text(raw);
        }
        let Ok(items) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) else {
            return Self::Text(raw);
        };
        let blocks: Vec<ContentBlock> = items.iter().filter_map(ContentBlock::from_value).collect();
        if blocks.is_empty() {
            return Self::Text(raw);
        }
        Self::Blocks(blocks)
    }

    /// Flatten to the string handed to callers: the concatenated `text` of
    /// all `type == "text"` blocks, or the text itself.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Blocks(blocks) => blocks
                .into_iter()
                .filter(|b| b.kind == "text")
                .filter_map(|b| b.text)
                .collect::<String>(),
        }
    }
}

/// Trait for LLM text generation, so the intake flow can run against
/// Gemini in production and a scripted mock in tests.
pub trait LlmClient: Send + Sync {
    fn generate(&self, request: &LlmRequest) -> Result<ModelReply, IntakeError>;
}

/// Failure a `MockLlmClient` can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Timeout,
    Unreachable,
    ServerError,
}

/// Mock LLM client for testing. Replays queued replies in order, then
/// repeats the fallback reply, and records every request it receives.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    failure: Option<MockFailure>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            failure: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue replies to return before falling back to the default one.
    pub fn with_replies(self, replies: &[&str]) -> Self {
        {
            let mut queue = self.replies.lock().unwrap_or_else(|e| e.into_inner());
            queue.extend(replies.iter().map(|r| r.to_string()));
        }
        self
    }

    pub fn failing(failure: MockFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new("")
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, request: &LlmRequest) -> Result<ModelReply, IntakeError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match self.failure {
            Some(MockFailure::Timeout) => return Err(IntakeError::Timeout(60)),
            Some(MockFailure::Unreachable) => {
                return Err(IntakeError::UpstreamConnection("mock".into()))
            }
            Some(MockFailure::ServerError) => {
                return Err(IntakeError::UpstreamStatus {
                    status: 500,
                    body: "internal".into(),
                })
            }
            None => {}
        }

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(ModelReply::from_raw(
            next.unwrap_or_else(|| self.fallback.clone()),
        ))
    }
}

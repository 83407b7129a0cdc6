use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::ScanResult;

/// Who wrote a conversation turn.
///
/// Accepts the storage/UI spellings (`user`, `ai`) as well as
/// `parent`/`assistant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    #[serde(alias = "user")]
    Parent,
    #[serde(alias = "ai", alias = "model")]
    Assistant,
}

/// One message of the intake conversation as supplied by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(alias = "sender")]
    pub role: TurnRole,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "attachmentId", skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<Uuid>,
}

impl ConversationTurn {
    pub fn parent(text: &str) -> Self {
        Self {
            role: TurnRole::Parent,
            text: text.to_string(),
            attachment_id: None,
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.to_string(),
            attachment_id: None,
        }
    }
}

/// Conversation register. Anything other than `doctor` is treated as patient mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ChatMode {
    Doctor,
    #[default]
    Patient,
}

impl ChatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
        }
    }
}

impl From<String> for ChatMode {
    fn from(value: String) -> Self {
        if value.trim().eq_ignore_ascii_case("doctor") {
            Self::Doctor
        } else {
            Self::Patient
        }
    }
}

/// Vitals the client already knows about, e.g. typed into the visit form.
///
/// Values may be numbers or strings. `0`, `""` and `null` count as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientStats {
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
}

impl PatientStats {
    pub fn age(&self) -> Option<String> {
        stat_value(self.age.as_ref())
    }

    pub fn weight(&self) -> Option<String> {
        stat_value(self.weight.as_ref())
    }

    pub fn height(&self) -> Option<String> {
        stat_value(self.height.as_ref())
    }
}

fn stat_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Structured interpretation of one uploaded scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    pub modality: String,
    pub findings: String,
    pub impression: String,
}

impl From<ScanResult> for ScanFinding {
    fn from(result: ScanResult) -> Self {
        Self {
            modality: result.modality,
            findings: result.findings,
            impression: result.impression,
        }
    }
}

/// Shape a generated visit summary must have before it is cached.
///
/// Numeric fields accept numbers or numeric strings; list fields accept a
/// list, a single comma-separated string, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitSummary {
    pub diagnosis: String,
    pub notes: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub head_circumference: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub heart_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub blood_pressure: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub prescription: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub follow_up_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub visit_type: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub given_vaccines: Vec<String>,
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        // "12.4 kg" and similar: keep the leading number, drop the rest.
        Value::String(s) => {
            let numeric: String = s
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            Ok(numeric.parse().ok())
        }
        other => Err(serde::de::Error::custom(format!(
            "expected number or numeric string, got {other}"
        ))),
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(items) => Ok(Some(
            items
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
        )),
        other => Err(serde::de::Error::custom(format!("expected text, got {other}"))),
    }
}

fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()),
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                other => Err(serde::de::Error::custom(format!(
                    "expected string list item, got {other}"
                ))),
            })
            .collect(),
        other => Err(serde::de::Error::custom(format!("expected list, got {other}"))),
    }
}

/// Input of one chat exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(alias = "patientId")]
    pub patient_id: Uuid,
    #[serde(default)]
    pub mode: ChatMode,
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    #[serde(default)]
    pub message: String,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<Uuid>,
    #[serde(default, alias = "attachmentId")]
    pub attachment_id: Option<Uuid>,
    #[serde(default, alias = "patientStats")]
    pub patient_stats: PatientStats,
}

/// Result of one chat exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub text: String,
    pub session_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_findings: Option<ScanFinding>,
}

//! Analysis outcomes and the response classifier.
//!
//! The backend answers with loosely shaped JSON. Every response is folded
//! into an [`AnalysisOutcome`] exactly once, here, so that nothing
//! downstream ever inspects the raw shape.
//!
//! ## Fetch classification (in priority order)
//!
//! 1. `success: true` with a non-null `data` → `Success(data)`
//! 2. an `is_legal_document` field is present (even `false`) → `Success(response)`
//! 3. a non-empty `error` → `Failure(retryable = can_retry)`
//! 4. anything else → `Absent`
//!
//! Case 2 matters: a document classified as "not a legal document" is a
//! finished analysis, not a crash and not a missing result.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::risk::RiskyWord;

/// Message used when a processing call fails without saying why.
pub const DEFAULT_PROCESS_FAILURE: &str = "Processing failed";

/// State of analysis for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    /// No analysis exists yet
    Absent,

    /// A fetch or processing call is in flight
    Pending,

    /// Analysis is available
    Success {
        payload: AnalysisPayload,
        retry_count: u32,
    },

    /// The last attempt failed
    Failure {
        message: String,
        retry_count: u32,
        retryable: bool,
    },
}

impl AnalysisOutcome {
    /// Stable outcomes are the ones a report page renders against.
    pub fn is_stable(&self) -> bool {
        !matches!(self, AnalysisOutcome::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            AnalysisOutcome::Success { retry_count, .. }
            | AnalysisOutcome::Failure { retry_count, .. } => *retry_count,
            AnalysisOutcome::Absent | AnalysisOutcome::Pending => 0,
        }
    }

    /// Whether the page should offer a process/retry affordance.
    pub fn can_retry(&self) -> bool {
        match self {
            AnalysisOutcome::Absent => true,
            AnalysisOutcome::Failure { retryable, .. } => *retryable,
            AnalysisOutcome::Pending | AnalysisOutcome::Success { .. } => false,
        }
    }

    pub fn payload(&self) -> Option<&AnalysisPayload> {
        match self {
            AnalysisOutcome::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Failure { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Short tag for logs.
    pub fn tag(&self) -> &'static str {
        match self {
            AnalysisOutcome::Absent => "absent",
            AnalysisOutcome::Pending => "pending",
            AnalysisOutcome::Success { .. } => "success",
            AnalysisOutcome::Failure { .. } => "failure",
        }
    }
}

/// Opaque structured result of one agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisPayload(JsonValue);

impl AnalysisPayload {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    /// `Some(false)` marks a valid negative classification the page must branch on.
    pub fn is_legal_document(&self) -> Option<bool> {
        self.0.get("is_legal_document").and_then(JsonValue::as_bool)
    }

    pub fn summary(&self) -> Option<&str> {
        self.0.get("summary").and_then(JsonValue::as_str)
    }

    pub fn document_type(&self) -> Option<&str> {
        self.0.get("document_type").and_then(JsonValue::as_str)
    }

    /// Text the annotations were computed against, when the backend echoes it.
    pub fn document_text(&self) -> Option<&str> {
        self.0
            .get("extracted_text")
            .or_else(|| self.0.get("document_text"))
            .and_then(JsonValue::as_str)
    }

    /// Risky-word annotations carried by a risk analysis.
    ///
    /// Looked up at the top level, then under `detailed_analysis`. A payload
    /// without annotations yields an empty list.
    pub fn risky_words(&self) -> Result<Vec<RiskyWord>, serde_json::Error> {
        let words = self
            .0
            .get("risky_words")
            .or_else(|| self.0.pointer("/detailed_analysis/risky_words"));

        match words {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone()),
            _ => Ok(Vec::new()),
        }
    }
}

/// Bookkeeping fields the backend attaches to analysis responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMeta {
    pub retry_count: u32,

    /// Server's verdict on whether a failed analysis may be retried
    pub can_retry: Option<bool>,

    pub model_used: Option<String>,

    pub ai_provider: Option<String>,

    pub created_at: Option<DateTime<Utc>>,
}

impl AnalysisMeta {
    /// Extract metadata from a raw response. Missing or malformed fields are ignored.
    pub fn from_response(response: &JsonValue) -> Self {
        let text = |field: &str| {
            response
                .get(field)
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        };

        Self {
            retry_count: response
                .get("retry_count")
                .and_then(JsonValue::as_u64)
                .map(|n| n.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
            can_retry: response.get("can_retry").and_then(JsonValue::as_bool),
            model_used: text("model_used"),
            ai_provider: text("ai_provider"),
            created_at: response
                .get("created_at")
                .and_then(JsonValue::as_str)
                .and_then(parse_timestamp),
        }
    }
}

/// A response after classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    /// Never `Pending`
    pub outcome: AnalysisOutcome,
    pub meta: AnalysisMeta,
}

/// Classify the response to "give me the existing analysis".
pub fn classify_fetch_response(response: &JsonValue) -> Classified {
    let meta = AnalysisMeta::from_response(response);
    let retry_count = meta.retry_count;

    let outcome = if let Some(data) = successful_data(response) {
        AnalysisOutcome::Success {
            payload: AnalysisPayload::new(data.clone()),
            retry_count,
        }
    } else if response
        .get("is_legal_document")
        .is_some_and(|v| !v.is_null())
    {
        AnalysisOutcome::Success {
            payload: AnalysisPayload::new(response.clone()),
            retry_count,
        }
    } else if let Some(message) = error_text(response) {
        AnalysisOutcome::Failure {
            message,
            retry_count,
            retryable: meta.can_retry.unwrap_or(true),
        }
    } else {
        AnalysisOutcome::Absent
    };

    Classified { outcome, meta }
}

/// Classify the response to "process this document now".
///
/// Anything other than an explicit success with data is a retryable failure.
pub fn classify_process_response(response: &JsonValue) -> Classified {
    let meta = AnalysisMeta::from_response(response);

    let outcome = match successful_data(response) {
        Some(data) => AnalysisOutcome::Success {
            payload: AnalysisPayload::new(data.clone()),
            retry_count: 0,
        },
        None => AnalysisOutcome::Failure {
            message: response
                .get("message")
                .and_then(JsonValue::as_str)
                .filter(|m| !m.trim().is_empty())
                .or_else(|| response.get("error").and_then(JsonValue::as_str))
                .unwrap_or(DEFAULT_PROCESS_FAILURE)
                .to_string(),
            retry_count: meta.retry_count,
            retryable: true,
        },
    };

    Classified { outcome, meta }
}

fn successful_data(response: &JsonValue) -> Option<&JsonValue> {
    if response.get("success").and_then(JsonValue::as_bool) != Some(true) {
        return None;
    }
    response.get("data").filter(|d| !d.is_null())
}

fn error_text(response: &JsonValue) -> Option<String> {
    match response.get("error")? {
        JsonValue::Null | JsonValue::Bool(false) => None,
        JsonValue::String(s) if s.trim().is_empty() => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(map) => Some(
            map.get("message")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| JsonValue::Object(map.clone()).to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// Backend timestamps come either as RFC 3339 or as naive ISO 8601 in UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

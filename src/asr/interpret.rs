//! Normalizes raw exchanges from either protocol into [`TranscriptionResult`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::transport::TransportError;
use super::{Mode, RawExchange, Stage};

pub const HEADER_STATUS_CODE: &str = "x-api-status-code";
pub const HEADER_MESSAGE: &str = "x-api-message";
pub const HEADER_LOG_ID: &str = "x-tt-logid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
}

/// Why an `error` outcome happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Protocol,
    PollTimeout,
}

/// Final record of one transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    #[serde(rename = "status")]
    pub outcome: Outcome,
    pub mode: Mode,
    pub stage: Stage,
    pub request_id: String,
    /// `None` when no response was received at all
    pub http_status: Option<u16>,
    pub api_status_code: String,
    pub api_message: String,
    pub log_id: String,
    /// Never absent; empty when the service returned no text
    pub result_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    /// Full parsed response body
    pub result: Value,
}

impl TranscriptionResult {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn with_error_kind(mut self, kind: ErrorKind) -> Self {
        self.outcome = Outcome::Error;
        self.error_kind = Some(kind);
        self
    }

    /// Result for a call that never produced an HTTP response.
    pub fn transport_failure(
        mode: Mode,
        stage: Stage,
        request_id: &str,
        error: &TransportError,
    ) -> Self {
        Self {
            outcome: Outcome::Error,
            mode,
            stage,
            request_id: request_id.to_string(),
            http_status: None,
            api_status_code: String::new(),
            api_message: String::new(),
            log_id: String::new(),
            result_text: String::new(),
            error_kind: Some(ErrorKind::Transport),
            completed_at: chrono::Utc::now(),
            result: json!({ "error": error.to_string() }),
        }
    }
}

/// Parse a response body. Empty bodies become `{}`; anything that is not
/// JSON is kept as `{"raw": <text>}`.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Transcript text from `result.text`, falling back to
/// `payload_msg.result.text`. First non-empty wins.
pub fn extract_text(body: &Value) -> String {
    ["/result/text", "/payload_msg/result/text"]
        .iter()
        .filter_map(|pointer| body.pointer(pointer).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
        .to_string()
}

pub fn interpret(exchange: &RawExchange, mode: Mode, request_id: &str) -> TranscriptionResult {
    let body = parse_body(&exchange.body);
    let success = exchange.is_success();

    TranscriptionResult {
        outcome: if success { Outcome::Success } else { Outcome::Error },
        mode,
        stage: exchange.stage,
        request_id: request_id.to_string(),
        http_status: Some(exchange.status),
        api_status_code: exchange.header(HEADER_STATUS_CODE).to_string(),
        api_message: exchange.header(HEADER_MESSAGE).to_string(),
        log_id: exchange.header(HEADER_LOG_ID).to_string(),
        result_text: extract_text(&body),
        error_kind: if success { None } else { Some(ErrorKind::Protocol) },
        completed_at: chrono::Utc::now(),
        result: body,
    }
}

use serde::Serialize;
use serde_json::{Map, Value};

pub const SUCCESS_MESSAGE: &str = "Data uploaded successfully";
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid request format: Expected a JSON object or list";

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub message: String,
}

impl WebhookResponse {
    pub fn success() -> Self {
        Self {
            status: "success",
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

/// Request body classified once at the HTTP boundary.
#[derive(Debug)]
pub enum WebhookPayload {
    SingleEvent(Map<String, Value>),
    EventBatch(Vec<Value>),
    Invalid { reason: String },
}

impl WebhookPayload {
    pub fn from_bytes(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(event)) => Self::SingleEvent(event),
            Ok(Value::Array(items)) => Self::EventBatch(items),
            Ok(other) => Self::Invalid {
                reason: format!("top-level {} is not an object or list", json_kind(&other)),
            },
            Err(err) => Self::Invalid {
                reason: format!("body is not valid JSON: {err}"),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SingleEvent(_) => "object",
            Self::EventBatch(_) => "list",
            Self::Invalid { .. } => "invalid",
        }
    }
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

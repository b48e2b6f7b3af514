use axum::http::StatusCode;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{json_kind, WebhookPayload, WebhookResponse, INVALID_FORMAT_MESSAGE};
use crate::state::AppState;
use crate::storage::{upload_json, BlobStore, StorageError};

pub const KEY_PREFIX: &str = "workfront/events";
pub const RECEIVED_AT_FIELD: &str = "received_at";
const UNKNOWN: &str = "unknown";

pub struct ServiceError {
    pub status: StatusCode,
    pub body: WebhookResponse,
}

impl ServiceError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: WebhookResponse::error(message),
        }
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("eventType must be a string, got {0}")]
    InvalidEventType(&'static str),
    #[error("newState must be an object, got {0}")]
    InvalidNewState(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-request outcome; only logged, the HTTP response stays generic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Persists every event in `payload`.
///
/// A batch never fails as a whole: non-object items are skipped and failed
/// writes are logged. A lone event surfaces storage failures to the caller.
pub async fn ingest(state: &AppState, payload: WebhookPayload) -> Result<IngestReport, ServiceError> {
    let current_date = date_segment(Utc::now());
    let mut report = IngestReport::default();

    match payload {
        WebhookPayload::Invalid { reason } => {
            tracing::error!(%reason, "invalid request format");
            return Err(ServiceError::new(StatusCode::BAD_REQUEST, INVALID_FORMAT_MESSAGE));
        }
        WebhookPayload::SingleEvent(event) => {
            tracing::info!("processing request as a single event");
            match persist_event(state, event, &current_date).await {
                Ok(_) => report.written += 1,
                Err(EventError::Storage(err)) => {
                    tracing::error!(error = %err, "error processing request");
                    return Err(ServiceError::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        err.to_string(),
                    ));
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to process event");
                    report.failed += 1;
                }
            }
        }
        WebhookPayload::EventBatch(items) => {
            tracing::info!(items = items.len(), "processing request as a list of events");
            for (index, item) in items.into_iter().enumerate() {
                let event = match item {
                    Value::Object(event) => event,
                    other => {
                        tracing::warn!(
                            index,
                            kind = json_kind(&other),
                            item = %other,
                            "skipping invalid item in list"
                        );
                        report.skipped += 1;
                        continue;
                    }
                };
                match persist_event(state, event, &current_date).await {
                    Ok(_) => report.written += 1,
                    Err(err) => {
                        tracing::error!(index, error = %err, "failed to process event");
                        report.failed += 1;
                    }
                }
            }
        }
    }

    tracing::info!(
        written = report.written,
        skipped = report.skipped,
        failed = report.failed,
        "request processed"
    );
    Ok(report)
}

pub async fn persist_event(
    state: &AppState,
    event: Map<String, Value>,
    current_date: &str,
) -> Result<String, EventError> {
    persist_event_at(
        state.store.as_ref(),
        &state.bucket,
        event,
        current_date,
        Utc::now(),
    )
    .await
}

/// Stamps `received_at`, derives the object key and uploads the event.
/// Returns the key written.
pub async fn persist_event_at(
    store: &dyn BlobStore,
    bucket: &str,
    mut event: Map<String, Value>,
    current_date: &str,
    now: DateTime<Utc>,
) -> Result<String, EventError> {
    let event_id = event_id(&event)?;
    let event_type = event_type(&event)?;

    event.insert(
        RECEIVED_AT_FIELD.to_string(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, true)),
    );

    let key = object_key(current_date, &event_type, &event_id, now.timestamp_millis());
    tracing::info!(%key, %event_id, %event_type, "generated object key");

    upload_json(store, bucket, &key, &Value::Object(event)).await?;
    Ok(key)
}

pub fn date_segment(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

pub fn object_key(current_date: &str, event_type: &str, event_id: &str, timestamp_ms: i64) -> String {
    format!("{KEY_PREFIX}/{current_date}/{event_type}/{event_id}_{timestamp_ms}.json")
}

/// `newState.ID`, or `unknown` when either level is missing.
pub fn event_id(event: &Map<String, Value>) -> Result<String, EventError> {
    let new_state = match event.get("newState") {
        None => return Ok(UNKNOWN.to_string()),
        Some(Value::Object(new_state)) => new_state,
        Some(other) => return Err(EventError::InvalidNewState(json_kind(other))),
    };

    Ok(match new_state.get("ID") {
        None => UNKNOWN.to_string(),
        Some(Value::String(id)) => id.clone(),
        // Non-string IDs use their JSON text, so booleans stay lowercase and null is "null".
        Some(other) => other.to_string(),
    })
}

/// `eventType` with spaces replaced by underscores, or `unknown` when missing.
pub fn event_type(event: &Map<String, Value>) -> Result<String, EventError> {
    match event.get("eventType") {
        None => Ok(UNKNOWN.to_string()),
        Some(Value::String(event_type)) => Ok(event_type.replace(' ', "_")),
        Some(other) => Err(EventError::InvalidEventType(json_kind(other))),
    }
}

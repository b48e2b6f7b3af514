use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::models::{WebhookPayload, WebhookResponse};
use crate::service;
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

pub async fn workfront_webhook(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    tracing::info!("received workfront webhook request");

    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::error!(error = %rejection, "failed to read request body");
            let response = WebhookResponse::error(rejection.body_text());
            return (rejection.status(), Json(response)).into_response();
        }
    };

    let payload = WebhookPayload::from_bytes(&body);
    tracing::info!(kind = payload.kind(), bytes = body.len(), "received payload");

    match service::ingest(&state, payload).await {
        Ok(_) => (StatusCode::OK, Json(WebhookResponse::success())).into_response(),
        Err(err) => (err.status, Json(err.body)).into_response(),
    }
}

mod app;
mod config;
mod handlers;
mod models;
mod service;
mod state;
mod storage;

use std::sync::Arc;
use webhook_common::{bind_listener, init_tracing, shutdown_signal};

use crate::config::{IngestConfig, StorageBackend};
use crate::state::AppState;
use crate::storage::{BlobStore, MemoryStore, S3Store};

#[tokio::main]
async fn main() {
    let _guards = init_tracing("webhook-service");

    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(2);
        }
    };

    let store = build_store(&config).await;
    tracing::info!(
        bucket = config.bucket.as_str(),
        backend = %config.backend,
        port = config.port,
        max_body_bytes = config.max_body_bytes,
        "starting webhook service"
    );

    let state = AppState::new(store, config.bucket.as_str());
    let app = app::build_router(state, config.max_body_bytes);
    let listener = bind_listener(config.port).await.expect("bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}

async fn build_store(config: &IngestConfig) -> Arc<dyn BlobStore> {
    match config.backend {
        StorageBackend::S3 => Arc::new(S3Store::new(config.s3.clone()).await),
        StorageBackend::Memory => {
            tracing::warn!("memory storage backend selected; events are lost on restart");
            Arc::new(MemoryStore::new())
        }
    }
}

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tokio::sync::Mutex;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to serialize {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to upload {key}: {message}")]
    Upload { key: String, message: String },
    #[error("bucket {bucket} unavailable: {message}")]
    Bucket { bucket: String, message: String },
}

/// Write-only view of an object store. Implementations return once the object
/// is durably accepted or the write has failed.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn backend(&self) -> &'static str;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}

/// Serializes `value` as 4-space indented JSON and stores it under `key`.
pub async fn upload_json(
    store: &dyn BlobStore,
    bucket: &str,
    key: &str,
    value: &Value,
) -> Result<(), StorageError> {
    tracing::info!(bucket, key, backend = store.backend(), "uploading object");

    let result = match to_indented_json(value) {
        Ok(body) => store.put_object(bucket, key, body, JSON_CONTENT_TYPE).await,
        Err(source) => Err(StorageError::Serialize {
            key: key.to_string(),
            source,
        }),
    };

    match &result {
        Ok(()) => tracing::info!(bucket, key, "object uploaded"),
        Err(err) => tracing::error!(bucket, key, error = %err, "object upload failed"),
    }
    result
}

fn to_indented_json(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut body = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut body, formatter);
    value.serialize(&mut serializer)?;
    Ok(body)
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
    pub ensure_bucket: bool,
}

/// S3-compatible backend. Also reaches GCS through its XML interoperability
/// endpoint when given HMAC keys.
pub struct S3Store {
    client: Client,
    ensure_bucket: bool,
    ensured: Mutex<HashSet<String>>,
}

impl S3Store {
    pub async fn new(config: S3Config) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region));
        if let (Some(access_key), Some(secret_key)) = (config.access_key, config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "workfront-webhook",
            ));
        }
        if let Some(endpoint) = config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(config.force_path_style)
            .build();
        Self {
            client: Client::from_conf(s3_config),
            ensure_bucket: config.ensure_bucket,
            ensured: Mutex::new(HashSet::new()),
        }
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let mut ensured = self.ensured.lock().await;
        if ensured.contains(bucket) {
            return Ok(());
        }

        let exists = self.client.head_bucket().bucket(bucket).send().await.is_ok();
        if !exists {
            tracing::info!(bucket, "creating missing bucket");
            self.client
                .create_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|err| StorageError::Bucket {
                    bucket: bucket.to_string(),
                    message: DisplayErrorContext(&err).to_string(),
                })?;
        }
        ensured.insert(bucket.to_string());
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3Store {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        if self.ensure_bucket {
            self.ensure_bucket(bucket).await?;
        }
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| StorageError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[cfg(test)]
impl StoredObject {
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Process-local store for tests and `STORAGE_BACKEND=memory` runs.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Objects ordered by bucket, then key.
    pub async fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().await;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                body,
            },
        );
        tracing::debug!(stored = objects.len(), "memory store updated");
        Ok(())
    }
}

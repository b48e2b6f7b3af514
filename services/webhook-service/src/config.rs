use std::{fmt, str::FromStr};
use thiserror::Error;
use webhook_common::{env_flag, env_optional, env_or, env_string};

use crate::storage::S3Config;

pub const DEFAULT_BUCKET: &str = "workfront-bucket-poc";
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown STORAGE_BACKEND {0:?}, expected \"s3\" or \"memory\"")]
    UnknownBackend(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::UnknownBackend(value.to_string())),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::S3 => "s3",
            Self::Memory => "memory",
        })
    }
}

#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub port: u16,
    pub bucket: String,
    pub max_body_bytes: usize,
    pub backend: StorageBackend,
    pub s3: S3Config,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = env_string("STORAGE_BACKEND", "s3").parse()?;
        let endpoint = env_optional("S3_ENDPOINT");
        // Custom endpoints (MinIO, GCS interop) generally need path-style addressing.
        let force_path_style = env_flag("S3_FORCE_PATH_STYLE", endpoint.is_some());
        let s3 = S3Config {
            endpoint,
            region: env_string("S3_REGION", DEFAULT_REGION),
            access_key: env_optional("S3_ACCESS_KEY"),
            secret_key: env_optional("S3_SECRET_KEY"),
            force_path_style,
            ensure_bucket: env_flag("S3_ENSURE_BUCKET", false),
        };

        Ok(Self {
            port: env_or("PORT", 8080u16),
            bucket: env_string("WORKFRONT_BUCKET_NAME", DEFAULT_BUCKET),
            max_body_bytes: env_or("MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES),
            backend,
            s3,
        })
    }
}

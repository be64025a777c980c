//! S3-backed raw store
//!
//! Durable-mode [`RawStore`] over any S3-compatible endpoint (AWS or
//! MinIO). Raw captures are immutable once written; keys are namespaced
//! by source and capture date.

use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use serde::{Deserialize, Serialize};
use snapflow_common::types::RawObjectMetadata;
use snapflow_common::{Result, SnapflowError};
use std::env;
use tracing::{debug, info, instrument};

use super::RawStore;
use async_trait::async_trait;

/// Connection settings for the raw object store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            endpoint: env::var("S3_ENDPOINT").ok(),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "snapflow-raw".to_string()),
            access_key: env::var("S3_ACCESS_KEY")
                .or_else(|_| env::var("AWS_ACCESS_KEY_ID"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("S3_SECRET_KEY")
                .or_else(|_| env::var("AWS_SECRET_ACCESS_KEY"))
                .unwrap_or_else(|_| "minioadmin".to_string()),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }
}

/// [`RawStore`] backed by an S3 bucket.
#[derive(Clone)]
pub struct S3RawStore {
    client: Client,
    bucket: String,
}

impl S3RawStore {
    pub fn new(config: StorageConfig) -> Self {
        debug!("Initializing raw store for bucket: {}", config.bucket);

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "snapflow-storage",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Raw store client initialized for bucket: {}", config.bucket);

        Self { client, bucket: config.bucket }
    }
}

#[async_trait]
impl RawStore for S3RawStore {
    #[instrument(skip(self, bytes, metadata))]
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: &RawObjectMetadata) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", bytes.len(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .metadata("source", &metadata.source)
            .metadata("kind", metadata.kind.to_string())
            .metadata("captured-at", metadata.captured_at.to_rfc3339())
            .metadata("content-hash", &metadata.content_hash)
            .send()
            .await
            .map_err(|e| {
                SnapflowError::Storage(format!(
                    "failed to upload s3://{}/{}: {}",
                    self.bucket, key, e
                ))
            })?;

        info!("Stored raw capture at s3://{}/{}", self.bucket, key);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        debug!("Downloading from s3://{}/{}", self.bucket, key);

        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(SnapflowError::NotFound(format!("raw object {key}")));
                }
                return Err(SnapflowError::Storage(format!(
                    "failed to download s3://{}/{}: {}",
                    self.bucket, key, service_error
                )));
            },
        };

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| SnapflowError::Storage(format!("failed to read S3 response body: {e}")))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), self.bucket, key);

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_defaults() {
        // Avoid env poking: the unset-path defaults matter, not overrides.
        let config = StorageConfig {
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: "snapflow-raw".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: false,
        };
        let store = S3RawStore::new(config);
        assert_eq!(store.bucket, "snapflow-raw");
    }
}

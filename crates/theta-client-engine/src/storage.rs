use std::sync::Arc;

use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use serde::{Deserialize, Serialize};

/// Configuration for the S3-compatible object-store backend.
///
/// Mirrors the upstream MinIO configuration this crate's predecessor used:
/// endpoint, access/secret keys, bucket, TLS flag, and optional "also-check"
/// buckets consulted for existence before reprocessing a key. Deliberately
/// `Serialize`/`Deserialize` so a deployment can load it from a config file
/// instead of constructing it in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub secure: bool,
    pub also_check_buckets: Vec<String>,
}

impl StorageConfig {
    /// Defaults matching a local MinIO instance started with its own
    /// defaults; a real deployment overrides every field.
    pub fn local_dev() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin123".to_string(),
            bucket: "theta-client-data".to_string(),
            secure: false,
            also_check_buckets: Vec::new(),
        }
    }
}

fn build_store(config: &StorageConfig, bucket: &str) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store = AmazonS3Builder::new()
        .with_endpoint(config.endpoint.clone())
        .with_access_key_id(config.access_key.clone())
        .with_secret_access_key(config.secret_key.clone())
        .with_bucket_name(bucket)
        .with_region("us-east-1")
        .with_allow_http(!config.secure)
        .build()?;
    Ok(Arc::new(store))
}

/// The primary bucket plus any "also-check" buckets, each as an independent
/// bucket-scoped store handle.
pub struct StorageBackends {
    pub primary: Arc<dyn ObjectStore>,
    also_check: Vec<Arc<dyn ObjectStore>>,
}

impl StorageBackends {
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let primary = build_store(config, &config.bucket)?;
        let also_check = config
            .also_check_buckets
            .iter()
            .map(|bucket| build_store(config, bucket))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            primary,
            also_check,
        })
    }

    /// True if `key` exists in the primary bucket or any also-check bucket,
    /// consulted in order.
    pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        let path = Path::from(key);
        if head_exists(&self.primary, &path).await? {
            return Ok(true);
        }
        for store in &self.also_check {
            if head_exists(store, &path).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

async fn head_exists(store: &Arc<dyn ObjectStore>, path: &Path) -> anyhow::Result<bool> {
    match store.head(path).await {
        Ok(_) => Ok(true),
        Err(object_store::Error::NotFound { .. }) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

//! S3 session: credentials and a lazily built object store client.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use object_store::aws::AmazonS3Builder;
use object_store::{ClientOptions, ObjectStore};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use weather_common::{CatalogError, Result};

/// Region used when the secrets file names none.
pub const DEFAULT_REGION: &str = "us-west-2";

/// Default bound on every S3 request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Blocking executor that works from within a tokio runtime.
///
/// Uses `tokio::task::block_in_place` to move the current task off the
/// async worker thread, then drives the future on the runtime handle. The
/// runtime must be multi-threaded.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Synchronous Zarr storage over the session's object store.
pub type S3ZarrStorage =
    AsyncToSyncStorageAdapter<AsyncObjectStore<Arc<dyn ObjectStore>>, TokioBlockOn>;

/// Credentials and connection settings read from a secrets YAML file.
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Secrets {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (e.g. MinIO).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

// Keep the secret key out of logs.
impl std::fmt::Debug for S3Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Secrets")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field("aws_secret_access_key", &"***")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("allow_http", &self.allow_http)
            .finish()
    }
}

impl S3Secrets {
    /// Parse secrets YAML. Missing credential keys are a configuration error.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let mapping = value.as_mapping().ok_or_else(|| {
            CatalogError::configuration("secrets file must be a YAML mapping")
        })?;

        let missing: Vec<&str> = ["aws_access_key_id", "aws_secret_access_key"]
            .into_iter()
            .filter(|key| !mapping.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(CatalogError::configuration(format!(
                "missing AWS credentials in secrets file: {}",
                missing.join(", ")
            )));
        }

        Ok(serde_yaml::from_value(value)?)
    }

    /// Read and parse a secrets file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::configuration(format!(
                "failed to read secrets file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }
}

/// A bucket plus the credentials to reach it.
///
/// The object store client is built on first use and shared afterwards.
pub struct S3Session {
    bucket: String,
    secrets: Option<S3Secrets>,
    timeout: Duration,
    client: OnceCell<Arc<dyn ObjectStore>>,
}

impl S3Session {
    pub fn new(bucket: impl Into<String>, secrets: S3Secrets, timeout: Duration) -> Result<Self> {
        let bucket = checked_bucket(bucket.into(), timeout)?;
        Ok(Self {
            bucket,
            secrets: Some(secrets),
            timeout,
            client: OnceCell::new(),
        })
    }

    /// Session over an already built store, for S3-compatible backends the
    /// builder cannot express.
    pub fn with_store(
        bucket: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let bucket = checked_bucket(bucket.into(), timeout)?;
        Ok(Self {
            bucket,
            secrets: None,
            timeout,
            client: OnceCell::new_with(Some(store)),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The object store client, built on first call.
    pub async fn client(&self) -> Result<Arc<dyn ObjectStore>> {
        self.client
            .get_or_try_init(|| async { self.build_client() })
            .await
            .cloned()
    }

    fn build_client(&self) -> Result<Arc<dyn ObjectStore>> {
        let secrets = self.secrets.as_ref().ok_or_else(|| {
            CatalogError::configuration("S3 session has neither a client nor credentials")
        })?;

        let options = ClientOptions::new()
            .with_timeout(self.timeout)
            .with_allow_http(secrets.allow_http);

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&self.bucket)
            .with_access_key_id(&secrets.aws_access_key_id)
            .with_secret_access_key(&secrets.aws_secret_access_key)
            .with_region(&secrets.region)
            .with_client_options(options);

        if let Some(endpoint) = &secrets.endpoint {
            builder = builder.with_endpoint(endpoint);
        }

        let store = builder.build().map_err(|e| {
            CatalogError::configuration(format!("failed to create S3 client: {}", e))
        })?;

        info!(bucket = %self.bucket, region = %secrets.region, "Created S3 client");
        Ok(Arc::new(store))
    }

    /// Synchronous Zarr storage over the client.
    pub async fn zarr_storage(&self) -> Result<Arc<S3ZarrStorage>> {
        let client = self.client().await?;
        let async_store = Arc::new(AsyncObjectStore::new(client));
        Ok(Arc::new(AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn)))
    }

    /// Check if an object exists, bounded by the session timeout.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let client = self.client().await?;
        let location = object_store::path::Path::from(key);

        let head = tokio::time::timeout(self.timeout, client.head(&location))
            .await
            .map_err(|_| {
                CatalogError::data_access(format!(
                    "timed out after {:?} checking s3://{}/{}",
                    self.timeout, self.bucket, key
                ))
            })?;

        match head {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => {
                debug!(key, "Object not found");
                Ok(false)
            }
            Err(e) => Err(CatalogError::data_access(format!(
                "failed to check s3://{}/{}: {}",
                self.bucket, key, e
            ))),
        }
    }
}

fn checked_bucket(bucket: String, timeout: Duration) -> Result<String> {
    if bucket.is_empty() {
        return Err(CatalogError::configuration("S3 bucket name must not be empty"));
    }
    if timeout.is_zero() {
        return Err(CatalogError::configuration("S3 timeout must be > 0"));
    }
    Ok(bucket)
}

impl std::fmt::Debug for S3Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Session")
            .field("bucket", &self.bucket)
            .field("secrets", &self.secrets)
            .field("timeout", &self.timeout)
            .field("connected", &self.client.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    #[test]
    fn test_secrets_defaults() {
        let secrets =
            S3Secrets::from_yaml("aws_access_key_id: AKIA\naws_secret_access_key: shh\n").unwrap();
        assert_eq!(secrets.region, "us-west-2");
        assert_eq!(secrets.endpoint, None);
        assert!(!secrets.allow_http);
        assert!(!format!("{:?}", secrets).contains("shh"));
    }

    #[test]
    fn test_secrets_missing_key() {
        let err = S3Secrets::from_yaml("aws_access_key_id: AKIA\n").unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
        assert!(err.to_string().contains("aws_secret_access_key"));
    }

    #[test]
    fn test_secrets_not_a_mapping() {
        let err = S3Secrets::from_yaml("- a\n- b\n").unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
    }

    #[test]
    fn test_secrets_file_missing() {
        let err = S3Secrets::from_file("/nonexistent/secrets.yaml").unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
    }

    #[test]
    fn test_session_rejects_empty_bucket() {
        let secrets =
            S3Secrets::from_yaml("aws_access_key_id: a\naws_secret_access_key: b\n").unwrap();
        assert!(S3Session::new("", secrets, DEFAULT_TIMEOUT).is_err());
    }

    #[test]
    fn test_session_rejects_zero_timeout() {
        let secrets =
            S3Secrets::from_yaml("aws_access_key_id: a\naws_secret_access_key: b\n").unwrap();
        let err = S3Session::new("weather", secrets, Duration::ZERO).unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));

        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let err = S3Session::with_store("weather", store, Duration::ZERO).unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_client_is_built_lazily() {
        let secrets = S3Secrets::from_yaml(
            "aws_access_key_id: a\naws_secret_access_key: b\nendpoint: http://localhost:9000\nallow_http: true\n",
        )
        .unwrap();
        let session = S3Session::new("weather", secrets, DEFAULT_TIMEOUT).unwrap();
        assert!(!session.client.initialized());

        let first = session.client().await.unwrap();
        let second = session.client().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_exists_with_in_memory_store() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        store
            .put(&object_store::path::Path::from("a/zarr.json"), "{}".into())
            .await
            .unwrap();

        let session = S3Session::with_store("weather", store, DEFAULT_TIMEOUT).unwrap();
        assert!(session.exists("a/zarr.json").await.unwrap());
        assert!(!session.exists("b/zarr.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_times_out_against_silent_endpoint() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let secrets = S3Secrets::from_yaml(&format!(
            "aws_access_key_id: a\naws_secret_access_key: b\nendpoint: http://{}\nallow_http: true\n",
            addr
        ))
        .unwrap();
        let session = S3Session::new("weather", secrets, Duration::from_millis(200)).unwrap();

        let err = session.exists("era5/reanalysis.zarr/zarr.json").await.unwrap_err();
        assert!(matches!(err, CatalogError::DataAccess(_)));
    }
}

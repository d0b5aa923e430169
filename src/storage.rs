use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use thiserror::Error;

/// Public URL prefix (and key prefix) under which avatars are published.
pub const AVATARS_PREFIX: &str = "avatars";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStore(String),

    #[error("storage failure simulated")]
    Simulated,
}

// 1. StorageService Contract
/// StorageService
///
/// The public file area processed avatars are written to. Implementations
/// return the URL the stored file is reachable at, which becomes the user's
/// `avatarURL`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Makes sure the target directory or bucket exists. Safe to call at every start.
    async fn prepare(&self) -> Result<(), StorageError>;

    /// Stores `bytes` as `avatars/<file_name>`, replacing any previous file of that name.
    async fn put_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Deletes the avatar published at `url`. URLs this store did not hand out
    /// (such as the generated default avatar) and already-missing files are
    /// left alone.
    async fn remove_avatar(&self, url: &str) -> Result<(), StorageError>;
}

/// Content type for the extensions the avatar processor produces.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`, empty segments) from a
/// key so a crafted file name can never escape the avatars area.
pub fn sanitize_key(key: &str) -> String {
    key.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("_")
}

// 2. Local public directory
/// LocalStorage
///
/// Writes into `<public_dir>/avatars`, which the router serves at `/avatars`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(avatars_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: avatars_dir.into(),
        }
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn prepare(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn put_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let file_name = sanitize_key(file_name);
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(&file_name), bytes).await?;
        Ok(format!("/{AVATARS_PREFIX}/{file_name}"))
    }

    async fn remove_avatar(&self, url: &str) -> Result<(), StorageError> {
        let prefix = format!("/{AVATARS_PREFIX}/");
        let Some(file_name) = url.strip_prefix(prefix.as_str()) else {
            return Ok(());
        };

        match tokio::fs::remove_file(self.root.join(sanitize_key(file_name))).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// 3. S3-compatible object store
/// S3StorageClient
///
/// Puts avatars into an S3-compatible bucket (MinIO locally). Path-style
/// addressing is forced for MinIO compatibility, and the returned URL uses the
/// same style.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    endpoint: String,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// CreateBucket is idempotent from our point of view: "already owned" is fine.
    async fn prepare(&self) -> Result<(), StorageError> {
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(bucket = %self.bucket_name, error = %e, "create_bucket skipped");
        }
        Ok(())
    }

    async fn put_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let key = format!("{AVATARS_PREFIX}/{}", sanitize_key(file_name));

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;

        Ok(format!("{}/{}/{}", self.endpoint, self.bucket_name, key))
    }

    async fn remove_avatar(&self, url: &str) -> Result<(), StorageError> {
        let prefix = format!("{}/{}/{AVATARS_PREFIX}/", self.endpoint, self.bucket_name);
        let Some(file_name) = url.strip_prefix(prefix.as_str()) else {
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(format!("{AVATARS_PREFIX}/{}", sanitize_key(file_name)))
            .send()
            .await
            .map_err(|e| StorageError::ObjectStore(e.to_string()))?;
        Ok(())
    }
}

// 4. The Mock Implementation (For Tests)
/// MockStorageService
///
/// Keeps stored avatars in memory so tests can inspect exactly what was written.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, every write fails.
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Bytes stored under `url`, as returned by `put_avatar`.
    pub fn object(&self, url: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(url).cloned())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn prepare(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }

        let url = format!("/{AVATARS_PREFIX}/{}", sanitize_key(file_name));
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(url.clone(), bytes);
        }
        Ok(url)
    }

    async fn remove_avatar(&self, url: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Simulated);
        }
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(url);
        }
        Ok(())
    }
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

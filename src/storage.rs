use std::path::PathBuf;

use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;

/// Destination for uploaded files. `put_object` returns the location string
/// (a filesystem path or an object URL) handed back to the client.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str)
        -> anyhow::Result<String>;
}

/// Writes uploads into a directory on the local disk.
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).context("create upload directory")?;
        Ok(Self { dir })
    }
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> anyhow::Result<String> {
        let path = self.dir.join(key);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        tracing::info!(path = %path.display(), "file saved locally");
        Ok(path.display().to_string())
    }
}

/// S3-compatible object storage. Keys land under an `uploads/csv/` prefix.
pub struct S3Storage {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl S3Storage {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
        region: &str,
    ) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ))
            .endpoint_url(endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> anyhow::Result<String> {
        let key = format!("uploads/csv/{}", key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(format!("{}/{}/{}", self.endpoint, self.bucket, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_writes_and_returns_path() {
        let dir = std::env::temp_dir().join(format!("intelhub-test-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(&dir).unwrap();

        let location = storage
            .put_object("report.csv", Bytes::from_static(b"a,b\n1,2\n"), "text/csv")
            .await
            .unwrap();

        assert!(location.ends_with("report.csv"));
        let written = std::fs::read_to_string(&location).unwrap();
        assert_eq!(written, "a,b\n1,2\n");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn local_storage_creates_missing_directory() {
        let dir = std::env::temp_dir()
            .join(format!("intelhub-test-{}", uuid::Uuid::new_v4()))
            .join("nested");
        assert!(!dir.exists());
        LocalStorage::new(&dir).unwrap();
        assert!(dir.exists());
        std::fs::remove_dir_all(dir.parent().unwrap()).ok();
    }
}

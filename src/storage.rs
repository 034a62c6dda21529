//! Blob storage for uploaded PDFs and previews.

mod remote;

pub use remote::RemoteStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Longest sanitized filename stem kept in storage keys.
const MAX_STEM_LEN: usize = 50;

/// A stored object opened for streaming.
pub struct Blob {
    pub stream: BoxStream<'static, io::Result<Bytes>>,
    /// Size in bytes when the backend reports it.
    pub len: Option<u64>,
}

/// Where book files live.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous object.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Open an object for streaming. Missing objects are `NotFound`.
    async fn open(&self, key: &str) -> Result<Blob>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// URL clients can use to fetch the object directly.
    fn public_url(&self, key: &str) -> String;

    /// Directory served statically, for backends that have one.
    fn local_root(&self) -> Option<&Path> {
        None
    }
}

/// Build the configured backend.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStore::new(&config.root))),
        StorageBackend::Remote => {
            if config.base_url.trim().is_empty() {
                return Err(AppError::Config(
                    "storage.base_url is required for the remote backend".to_string(),
                ));
            }
            Ok(Arc::new(RemoteStore::new(
                &config.base_url,
                config.token.clone(),
            )))
        }
    }
}

/// Lowercase, replace anything but ASCII alphanumerics with `-`, cap the length.
pub fn sanitize_stem(name: &str) -> String {
    let stem = name
        .rsplit_once('.')
        .filter(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .map_or(name, |(stem, _)| stem);

    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();

    if sanitized.is_empty() {
        "book".to_string()
    } else {
        sanitized
    }
}

/// Storage keys for an upload's original and preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadKeys {
    pub pdf: String,
    pub preview: String,
}

impl UploadKeys {
    /// Derive keys from the client filename and upload time in milliseconds.
    pub fn new(original_name: &str, millis: i64) -> Self {
        let name = format!("{}-{}", sanitize_stem(original_name), millis);
        Self {
            pdf: format!("pdfs/{}.pdf", name),
            preview: format!("previews/preview-{}.pdf", name),
        }
    }
}

/// Files under a local directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key below the root, rejecting traversal.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(AppError::InvalidInput(format!("Invalid storage key: {}", key)));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;

        tracing::debug!(path = %path.display(), size = data.len(), "Stored file");
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<Blob> {
        let path = self.path_for(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AppError::NotFound("File not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let len = file.metadata().await?.len();
        Ok(Blob {
            stream: ReaderStream::new(file).boxed(),
            len: Some(len),
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("/books/{}", key)
    }

    fn local_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(blob: Blob) -> Vec<u8> {
        let chunks: Vec<io::Result<Bytes>> = blob.stream.collect().await;
        chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect()
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("My Book (2nd ed).pdf"), "my-book--2nd-ed-");
        assert_eq!(sanitize_stem("notes.PDF"), "notes");
        assert_eq!(sanitize_stem("archive.tar"), "archive-tar");
        assert_eq!(sanitize_stem(".pdf"), "book");
        assert_eq!(sanitize_stem(&"x".repeat(80)).len(), MAX_STEM_LEN);
    }

    #[test]
    fn test_upload_keys_share_a_name() {
        let keys = UploadKeys::new("Intro to Rust.pdf", 1700000000000);
        assert_eq!(keys.pdf, "pdfs/intro-to-rust-1700000000000.pdf");
        assert_eq!(keys.preview, "previews/preview-intro-to-rust-1700000000000.pdf");
    }

    #[tokio::test]
    async fn test_local_put_open_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .put("pdfs/a.pdf", Bytes::from_static(b"%PDF-1.4 data"), "application/pdf")
            .await
            .unwrap();

        let blob = store.open("pdfs/a.pdf").await.unwrap();
        assert_eq!(blob.len, Some(13));
        assert_eq!(read_all(blob).await, b"%PDF-1.4 data");
        assert_eq!(store.public_url("pdfs/a.pdf"), "/books/pdfs/a.pdf");

        store.delete("pdfs/a.pdf").await.unwrap();
        assert!(matches!(
            store.open("pdfs/a.pdf").await,
            Err(AppError::NotFound(_))
        ));

        // Deleting twice is fine.
        store.delete("pdfs/a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        assert!(matches!(
            store.open("../etc/passwd").await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            store.put("/abs.pdf", Bytes::new(), "application/pdf").await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_remote_backend_needs_base_url() {
        let config = StorageConfig {
            backend: StorageBackend::Remote,
            ..Default::default()
        };
        assert!(matches!(from_config(&config), Err(AppError::Config(_))));
    }
}

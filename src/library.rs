//! Catalog uploads and stored artifacts.

use crate::db::{Book, BookStatus, Database, NewBook};
use crate::error::{AppError, Result};
use crate::pdf;
use crate::storage::{Blob, BlobStore, UploadKeys};
use axum::body::Bytes;
use std::sync::Arc;

/// MIME type of uploads and stored artifacts.
pub const PDF_MIME: &str = "application/pdf";

/// Metadata fields sent alongside an upload.
#[derive(Debug, Clone, Default)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub description: Option<String>,
    pub categories: Option<String>,
    pub language: Option<String>,
    pub published_date: Option<String>,
    pub page_count: Option<i64>,
    pub isbn: Option<String>,
    pub thumbnail: Option<String>,
}

/// The PDF part of an upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Which stored artifact of a book to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Pdf,
    Preview,
}

/// Upload pipeline and artifact access.
pub struct Library {
    db: Database,
    storage: Arc<dyn BlobStore>,
    preview_pages: u32,
    max_upload_bytes: u64,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Library {
    pub fn new(
        db: Database,
        storage: Arc<dyn BlobStore>,
        preview_pages: u32,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            db,
            storage,
            preview_pages,
            max_upload_bytes,
        }
    }

    /// Storage backend.
    pub fn storage(&self) -> &Arc<dyn BlobStore> {
        &self.storage
    }

    fn validate(&self, file: Option<&UploadedFile>, meta: &BookMetadata) -> Result<()> {
        let Some(file) = file.filter(|f| !f.data.is_empty()) else {
            return Err(AppError::InvalidInput("Please upload a PDF file".to_string()));
        };

        let declared_pdf = file
            .content_type
            .as_deref()
            .is_none_or(|ct| ct.eq_ignore_ascii_case(PDF_MIME));
        if !declared_pdf || !pdf::looks_like_pdf(&file.data) {
            return Err(AppError::InvalidInput(
                "Only PDF files are allowed".to_string(),
            ));
        }

        if file.data.len() as u64 > self.max_upload_bytes {
            return Err(AppError::InvalidInput(format!(
                "File too large (max {} MB)",
                self.max_upload_bytes / (1024 * 1024)
            )));
        }

        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if !has(&meta.title) || !has(&meta.authors) {
            return Err(AppError::InvalidInput(
                "Title and authors are required".to_string(),
            ));
        }

        Ok(())
    }

    /// Store an uploaded PDF, generate its preview and publish the catalog entry.
    ///
    /// The entry is only visible once both artifacts are stored. On any
    /// failure after the original is stored, the row and artifacts are removed.
    pub async fn upload(
        &self,
        uploader: i64,
        file: Option<UploadedFile>,
        meta: BookMetadata,
    ) -> Result<Book> {
        self.validate(file.as_ref(), &meta)?;
        let Some(file) = file else {
            return Err(AppError::InvalidInput("Please upload a PDF file".to_string()));
        };

        let keys = UploadKeys::new(&file.file_name, chrono::Utc::now().timestamp_millis());

        self.storage
            .put(&keys.pdf, file.data.clone(), PDF_MIME)
            .await?;

        let new_book = NewBook {
            isbn: non_empty(meta.isbn),
            title: non_empty(meta.title).unwrap_or_default(),
            authors: non_empty(meta.authors).unwrap_or_default(),
            description: non_empty(meta.description),
            categories: non_empty(meta.categories).unwrap_or_else(|| "Uncategorized".to_string()),
            language: non_empty(meta.language),
            published_date: non_empty(meta.published_date),
            page_count: meta.page_count.filter(|&p| p > 0),
            pdf_key: Some(keys.pdf.clone()),
            pdf_url: Some(self.storage.public_url(&keys.pdf)),
            thumbnail: non_empty(meta.thumbnail),
            uploaded_by: Some(uploader),
        };

        let book = match self.db.create_book(&new_book, BookStatus::Processing) {
            Ok(book) => book,
            Err(e) => {
                self.discard(None, &keys).await;
                return Err(e);
            }
        };

        match self.publish(&book, &keys, file.data).await {
            Ok(ready) => {
                tracing::info!(
                    book_id = ready.id,
                    uploader,
                    pages = ready.page_count,
                    "Book uploaded"
                );
                Ok(ready)
            }
            Err(e) => {
                tracing::warn!(book_id = book.id, error = %e, "Upload failed, discarding");
                self.discard(Some(book.id), &keys).await;
                Err(e)
            }
        }
    }

    async fn publish(&self, book: &Book, keys: &UploadKeys, data: Bytes) -> Result<Book> {
        let max_pages = self.preview_pages;
        let (preview, info) =
            tokio::task::spawn_blocking(move || pdf::generate_preview(&data, max_pages))
                .await
                .map_err(|e| AppError::Internal(format!("Preview task failed: {}", e)))??;

        tracing::debug!(book_id = book.id, pages = info.page_count, "Preview generated");

        self.storage
            .put(&keys.preview, Bytes::from(preview), PDF_MIME)
            .await?;

        let preview_url = self.storage.public_url(&keys.preview);
        // The document's own subject stands in for a missing description.
        self.db.mark_book_ready(
            book.id,
            &keys.preview,
            &preview_url,
            info.page_count as i64,
            info.subject.as_deref(),
        )?;

        self.db
            .get_book(book.id)?
            .ok_or_else(|| AppError::Internal("Uploaded book vanished".to_string()))
    }

    /// Best-effort removal of a half-finished upload.
    async fn discard(&self, book_id: Option<i64>, keys: &UploadKeys) {
        if let Some(id) = book_id
            && let Err(e) = self.db.delete_book(id)
        {
            tracing::error!(book_id = id, error = %e, "Failed to remove book row");
        }

        for key in [&keys.pdf, &keys.preview] {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to remove stored file");
            }
        }
    }

    /// Delete a catalog entry owned by `user_id` and its artifacts.
    pub async fn delete_book(&self, user_id: i64, key: &str) -> Result<()> {
        let book = self
            .db
            .find_catalog_book(key)?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.uploaded_by != Some(user_id) {
            return Err(AppError::Forbidden(
                "Not authorized to delete this book".to_string(),
            ));
        }

        self.db.delete_book(book.id)?;

        for stored in [book.pdf_key.as_deref(), book.preview_key.as_deref()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = self.storage.delete(stored).await {
                tracing::warn!(key = stored, error = %e, "Failed to remove stored file");
            }
        }

        tracing::info!(book_id = book.id, user_id, "Book deleted");
        Ok(())
    }

    /// Open one of a catalog entry's artifacts for streaming.
    pub async fn open(&self, key: &str, artifact: Artifact) -> Result<(Book, Blob)> {
        let book = self
            .db
            .find_catalog_book(key)?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        let stored = match artifact {
            Artifact::Pdf => book.pdf_key.clone(),
            Artifact::Preview => book.preview_key.clone(),
        }
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        let blob = self.storage.open(&stored).await?;
        Ok((book, blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStore;

    fn library(root: &std::path::Path, max_upload_bytes: u64) -> (Library, Database) {
        let db = Database::open_memory().unwrap();
        let library = Library::new(
            db.clone(),
            Arc::new(LocalStore::new(root)),
            5,
            max_upload_bytes,
        );
        (library, db)
    }

    fn meta(title: &str) -> BookMetadata {
        BookMetadata {
            title: Some(title.to_string()),
            authors: Some("A. Author".to_string()),
            ..Default::default()
        }
    }

    fn file(name: &str, data: Vec<u8>) -> Option<UploadedFile> {
        Some(UploadedFile {
            file_name: name.to_string(),
            content_type: Some(PDF_MIME.to_string()),
            data: Bytes::from(data),
        })
    }

    fn uploader(db: &Database) -> i64 {
        db.create_user(&crate::db::NewUser {
            email: "up@example.edu".to_string(),
            username: "uploader".to_string(),
            password_hash: "hash".to_string(),
            ..Default::default()
        })
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_upload_publishes_ready_book() {
        let dir = tempfile::tempdir().unwrap();
        let (library, db) = library(dir.path(), 1024 * 1024);
        let user = uploader(&db);

        let book = library
            .upload(user, file("Intro.pdf", pdf::sample_pdf(6, None)), meta("Intro"))
            .await
            .unwrap();

        assert_eq!(book.status, BookStatus::Ready);
        assert_eq!(book.page_count, Some(6));
        assert_eq!(book.categories, "Uncategorized");
        assert!(book.pdf_url.as_deref().unwrap().starts_with("/books/pdfs/intro-"));
        assert!(
            book.preview_url
                .as_deref()
                .unwrap()
                .starts_with("/books/previews/preview-intro-")
        );

        let preview = dir.path().join(book.preview_key.as_deref().unwrap());
        let bytes = std::fs::read(preview).unwrap();
        assert_eq!(pdf::inspect(&bytes).unwrap().page_count, 5);
    }

    #[tokio::test]
    async fn test_upload_falls_back_to_document_subject() {
        let dir = tempfile::tempdir().unwrap();
        let (library, db) = library(dir.path(), 1024 * 1024);
        let user = uploader(&db);

        let book = library
            .upload(
                user,
                file("notes.pdf", pdf::sample_pdf(2, Some("Lecture notes"))),
                meta("Notes"),
            )
            .await
            .unwrap();
        assert_eq!(book.description.as_deref(), Some("Lecture notes"));

        let described = BookMetadata {
            description: Some("Typed by the uploader".to_string()),
            ..meta("Notes again")
        };
        let book = library
            .upload(
                user,
                file("notes-2.pdf", pdf::sample_pdf(2, Some("Lecture notes"))),
                described,
            )
            .await
            .unwrap();
        assert_eq!(book.description.as_deref(), Some("Typed by the uploader"));
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let (library, db) = library(dir.path(), 64);
        let user = uploader(&db);

        let missing = library.upload(user, None, meta("T")).await;
        assert!(matches!(missing, Err(AppError::InvalidInput(_))));

        let not_pdf = library
            .upload(user, file("a.pdf", b"hello".to_vec()), meta("T"))
            .await;
        assert!(matches!(not_pdf, Err(AppError::InvalidInput(_))));

        let too_big = library
            .upload(user, file("a.pdf", pdf::sample_pdf(1, None)), meta("T"))
            .await;
        assert!(matches!(too_big, Err(AppError::InvalidInput(_))));

        let no_title = library
            .upload(user, file("a.pdf", b"%PDF-1.4".to_vec()), BookMetadata::default())
            .await;
        assert!(matches!(no_title, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_failed_preview_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let (library, db) = library(dir.path(), 1024 * 1024);
        let user = uploader(&db);

        let result = library
            .upload(
                user,
                file("broken.pdf", b"%PDF-1.4 garbage".to_vec()),
                meta("Broken"),
            )
            .await;

        assert!(matches!(result, Err(AppError::Processing(_))));
        assert!(db.get_book(1).unwrap().is_none());

        let leftovers = std::fs::read_dir(dir.path().join("pdfs")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_delete_book_requires_uploader() {
        let dir = tempfile::tempdir().unwrap();
        let (library, db) = library(dir.path(), 1024 * 1024);
        let user = uploader(&db);

        let book = library
            .upload(user, file("a.pdf", pdf::sample_pdf(2, None)), meta("A"))
            .await
            .unwrap();
        let key = book.id.to_string();

        assert!(matches!(
            library.delete_book(user + 1, &key).await,
            Err(AppError::Forbidden(_))
        ));

        library.delete_book(user, &key).await.unwrap();
        assert!(matches!(
            library.open(&key, Artifact::Pdf).await,
            Err(AppError::NotFound(_))
        ));
        assert!(!dir.path().join(book.pdf_key.unwrap()).exists());
    }
}

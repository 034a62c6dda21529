//! HTTPS content host backend.

use super::{Blob, BlobStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use reqwest::{StatusCode, header};
use std::io;

/// Objects stored at `<base_url>/<key>` on a content host that accepts
/// PUT, GET and DELETE.
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    fn url(&self, key: &str) -> String {
        let encoded: Vec<_> = key.split('/').map(urlencoding::encode).collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }

    fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(key));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn storage_err(action: &'static str) -> impl FnOnce(reqwest::Error) -> AppError {
    move |e| AppError::Storage(format!("{} failed: {}", action, e))
}

#[async_trait]
impl BlobStore for RemoteStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let size = data.len();
        let response = self
            .request(reqwest::Method::PUT, key)
            .header(header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(storage_err("Upload"))?;

        if !response.status().is_success() {
            return Err(AppError::Storage(format!(
                "Upload of {} rejected with status {}",
                key,
                response.status()
            )));
        }

        tracing::debug!(key, size, "Stored file on content host");
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<Blob> {
        let response = self
            .request(reqwest::Method::GET, key)
            .send()
            .await
            .map_err(storage_err("Download"))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(AppError::NotFound("File not found".to_string())),
            status => {
                return Err(AppError::Storage(format!(
                    "Download of {} failed with status {}",
                    key, status
                )));
            }
        }

        let len = response.content_length();
        let stream = response.bytes_stream().map(|r| r.map_err(io::Error::other));

        Ok(Blob {
            stream: stream.boxed(),
            len,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .request(reqwest::Method::DELETE, key)
            .send()
            .await
            .map_err(storage_err("Delete"))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(AppError::Storage(format!(
                "Delete of {} failed with status {}",
                key, status
            )))
        }
    }

    fn public_url(&self, key: &str) -> String {
        self.url(key)
    }
}

//! [`BlobStore`] backed by a Supabase Storage bucket.

use async_trait::async_trait;
use mime::Mime;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use super::blob_store::{BlobStore, BlobStoreError};
use crate::config::StorageConfig;

#[derive(Clone)]
pub struct SupabaseBlobStore {
    client: Client,
    config: StorageConfig,
}

impl std::fmt::Debug for SupabaseBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseBlobStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SupabaseBlobStore {
    pub fn new(config: StorageConfig) -> Result<Self, BlobStoreError> {
        let client = Client::builder()
            .build()
            .map_err(|err| BlobStoreError::Transport(err.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn object_url(&self, visibility: Option<&str>, key: &str) -> Result<Url, BlobStoreError> {
        object_url(&self.config.url, &self.config.bucket, visibility, key)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.anon_key)
            .header("apikey", &self.config.anon_key)
    }
}

pub(crate) fn object_url(
    base: &Url,
    bucket: &str,
    visibility: Option<&str>,
    key: &str,
) -> Result<Url, BlobStoreError> {
    if key.is_empty() {
        return Err(BlobStoreError::InvalidKey(key.to_string()));
    }

    let mut segments = vec!["storage", "v1", "object"];
    segments.extend(visibility);
    segments.push(bucket);
    segments.push(key);

    super::join_segments(base, &segments).ok_or_else(|| BlobStoreError::InvalidKey(key.to_string()))
}

#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(default)]
    message: String,
}

async fn expect_success(response: Response, key: &str) -> Result<(), BlobStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response
        .text()
        .await
        .map_err(|err| BlobStoreError::Transport(err.to_string()))?;

    if status == StatusCode::CONFLICT {
        return Err(BlobStoreError::AlreadyExists(key.to_string()));
    }

    let message = serde_json::from_str::<StorageErrorBody>(&body)
        .map(|error| error.message)
        .unwrap_or(body);
    Err(BlobStoreError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl BlobStore for SupabaseBlobStore {
    #[instrument(skip(self, bytes, content_type), fields(bucket = %self.config.bucket, size = bytes.len()))]
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &Mime,
    ) -> Result<(), BlobStoreError> {
        let url = self.object_url(None, key)?;
        let response = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, content_type.as_ref())
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|err| BlobStoreError::Transport(err.to_string()))?;

        expect_success(response, key).await?;
        debug!(key, "object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<String, BlobStoreError> {
        self.object_url(Some("public"), key).map(String::from)
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn remove(&self, key: &str) -> Result<(), BlobStoreError> {
        let url = super::join_segments(
            &self.config.url,
            &["storage", "v1", "object", self.config.bucket.as_str()],
        )
        .ok_or_else(|| BlobStoreError::InvalidKey(key.to_string()))?;

        let response = self
            .request(Method::DELETE, url)
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await
            .map_err(|err| BlobStoreError::Transport(err.to_string()))?;

        expect_success(response, key).await
    }
}

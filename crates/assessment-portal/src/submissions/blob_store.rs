use async_trait::async_trait;
use mime::Mime;

/// Upload/public-URL contract of the external object store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &Mime,
    ) -> Result<(), BlobStoreError>;

    /// Resolves the public URL for `key`; does not check the object exists.
    fn public_url(&self, key: &str) -> Result<String, BlobStoreError>;

    async fn remove(&self, key: &str) -> Result<(), BlobStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("blob store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("blob store unreachable: {0}")]
    Transport(String),
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
}

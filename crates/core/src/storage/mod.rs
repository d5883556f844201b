//! Object-store access. The service only needs list-by-prefix, read, and
//! (for preferences) write.

pub mod gcs;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::credentials::TokenError;

pub use gcs::GcsObjectStore;
pub use memory::InMemoryObjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store returned HTTP {status} for {key}: {body}")]
    Status { key: String, status: u16, body: String },

    #[error("object store unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("object store credentials: {0}")]
    Token(#[from] TokenError),

    #[error("object store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys under `prefix`, in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn read(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn write(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError>;
}

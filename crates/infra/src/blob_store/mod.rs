//! Blob storage boundary (uploaded images and site assets).

pub mod in_memory;

pub use in_memory::InMemoryBlobStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Full path of one stored object, e.g. `sliders/u1/hero.png`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef {
    pub path: String,
}

impl BlobRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl core::fmt::Display for BlobRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.path)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlobError {
    #[error("blob storage unavailable: {0}")]
    Unavailable(String),

    #[error("blob call timed out")]
    Timeout,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Every blob whose path starts with `prefix`. An unknown prefix is empty.
    async fn list_under_prefix(&self, prefix: &str) -> Result<Vec<BlobRef>, BlobError>;

    async fn delete(&self, blob: &BlobRef) -> Result<(), BlobError>;
}

#[async_trait]
impl<B> BlobStore for Arc<B>
where
    B: BlobStore + ?Sized,
{
    async fn list_under_prefix(&self, prefix: &str) -> Result<Vec<BlobRef>, BlobError> {
        (**self).list_under_prefix(prefix).await
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), BlobError> {
        (**self).delete(blob).await
    }
}

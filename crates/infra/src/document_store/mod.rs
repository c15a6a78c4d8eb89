//! Flat, non-relational document store boundary.
//!
//! No foreign keys, no multi-document transactions, no schema. Deleting a
//! document that does not exist succeeds.

pub mod in_memory;

pub use in_memory::InMemoryDocumentStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use siteforge_core::{CollectionName, Document, DocumentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied on '{0}'")]
    PermissionDenied(String),

    #[error("store call timed out")]
    Timeout,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &CollectionName, id: &DocumentId) -> Result<Option<Document>, StoreError>;

    /// Documents whose `field` holds the string `value`.
    async fn query_by_field(
        &self,
        collection: &CollectionName,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError>;

    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError>;

    async fn list_all(&self, collection: &CollectionName) -> Result<Vec<Document>, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn get(&self, collection: &CollectionName, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        (**self).get(collection, id).await
    }

    async fn query_by_field(
        &self,
        collection: &CollectionName,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        (**self).query_by_field(collection, field, value).await
    }

    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError> {
        (**self).delete(collection, id).await
    }

    async fn list_all(&self, collection: &CollectionName) -> Result<Vec<Document>, StoreError> {
        (**self).list_all(collection).await
    }
}

//! Infrastructure layer: collaborator boundaries and their adapters.
//!
//! The document store, blob store and authentication provider are external
//! shared services. This crate defines the traits the platform consumes them
//! through, plus in-memory implementations for tests/dev.

pub mod auth_service;
pub mod blob_store;
pub mod document_store;
pub mod membership;

pub use auth_service::InMemoryAuthService;
pub use blob_store::{BlobError, BlobRef, BlobStore, InMemoryBlobStore};
pub use document_store::{DocumentStore, InMemoryDocumentStore, StoreError};
pub use membership::StoreMembershipDirectory;

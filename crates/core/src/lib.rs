//! `siteforge-core` — platform building blocks shared by every crate.
//!
//! This crate contains **pure** primitives (no I/O, no async, no storage).

pub mod collection;
pub mod document;
pub mod error;
pub mod id;
pub mod layout;

pub use collection::CollectionName;
pub use document::Document;
pub use error::{DomainError, DomainResult};
pub use id::{DocumentId, PrincipalId, TenantName};

use std::collections::BTreeSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::{BlobError, BlobRef, BlobStore};

/// In-memory blob store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeSet<String>>,
    failing_prefixes: RwLock<Vec<String>>,
    mutations: AtomicU64,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, path: impl Into<String>) {
        if let Ok(mut blobs) = self.blobs.write() {
            blobs.insert(path.into());
        }
    }

    /// Deletes of blobs under `prefix` fail until cleared.
    pub fn fail_deletes_under(&self, prefix: impl Into<String>) {
        if let Ok(mut p) = self.failing_prefixes.write() {
            p.push(prefix.into());
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut p) = self.failing_prefixes.write() {
            p.clear();
        }
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list_under_prefix(&self, prefix: &str) -> Result<Vec<BlobRef>, BlobError> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| BlobError::Unavailable("lock poisoned".to_string()))?;
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|p| p.starts_with(prefix))
            .map(|p| BlobRef::new(p.clone()))
            .collect())
    }

    async fn delete(&self, blob: &BlobRef) -> Result<(), BlobError> {
        let failing = self
            .failing_prefixes
            .read()
            .map(|p| p.iter().any(|prefix| blob.path.starts_with(prefix.as_str())))
            .unwrap_or(false);
        if failing {
            return Err(BlobError::Unavailable(format!("injected fault on '{blob}'")));
        }

        let mut blobs = self
            .blobs
            .write()
            .map_err(|_| BlobError::Unavailable("lock poisoned".to_string()))?;
        if blobs.remove(&blob.path) {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use siteforge_core::{CollectionName, Document, DocumentId};

use super::{DocumentStore, StoreError};

/// Injected misbehaviour for one collection (tests/dev).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// `get`, `query_by_field` and `list_all` fail.
    FailReads,
    /// `delete` fails.
    FailDeletes,
    /// Every call on the collection never completes.
    Stall,
    /// `query_by_field` on this field returns nothing (missing index);
    /// `list_all` still sees the documents.
    UnindexedField(String),
}

/// In-memory document store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<BTreeMap<CollectionName, BTreeMap<DocumentId, Document>>>,
    faults: RwLock<HashMap<CollectionName, Vec<Fault>>>,
    mutations: AtomicU64,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document (does not count as a mutation).
    pub fn insert(&self, collection: CollectionName, document: Document) {
        if let Ok(mut map) = self.collections.write() {
            map.entry(collection).or_default().insert(document.id.clone(), document);
        }
    }

    pub fn inject(&self, collection: CollectionName, fault: Fault) {
        if let Ok(mut faults) = self.faults.write() {
            faults.entry(collection).or_default().push(fault);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            faults.clear();
        }
    }

    /// Number of successful deletes performed through the trait.
    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn count(&self, collection: &CollectionName) -> usize {
        self.collections
            .read()
            .map(|map| map.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn contains(&self, collection: &CollectionName, id: &DocumentId) -> bool {
        self.collections
            .read()
            .map(|map| map.get(collection).is_some_and(|c| c.contains_key(id)))
            .unwrap_or(false)
    }

    pub fn collection_names(&self) -> Vec<CollectionName> {
        self.collections
            .read()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn faults_for(&self, collection: &CollectionName) -> Vec<Fault> {
        self.faults
            .read()
            .map(|f| f.get(collection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    async fn check(&self, collection: &CollectionName, is_delete: bool) -> Result<(), StoreError> {
        let faults = self.faults_for(collection);
        if faults.contains(&Fault::Stall) {
            std::future::pending::<()>().await;
        }
        let fault = if is_delete { Fault::FailDeletes } else { Fault::FailReads };
        if faults.contains(&fault) {
            return Err(StoreError::Unavailable(format!("injected fault on '{collection}'")));
        }
        Ok(())
    }

    fn read_collection<T>(
        &self,
        collection: &CollectionName,
        f: impl FnOnce(Option<&BTreeMap<DocumentId, Document>>) -> T,
    ) -> Result<T, StoreError> {
        let map = self
            .collections
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(f(map.get(collection)))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &CollectionName, id: &DocumentId) -> Result<Option<Document>, StoreError> {
        self.check(collection, false).await?;
        self.read_collection(collection, |c| c.and_then(|c| c.get(id)).cloned())
    }

    async fn query_by_field(
        &self,
        collection: &CollectionName,
        field: &str,
        value: &str,
    ) -> Result<Vec<Document>, StoreError> {
        self.check(collection, false).await?;
        if self
            .faults_for(collection)
            .contains(&Fault::UnindexedField(field.to_string()))
        {
            return Ok(Vec::new());
        }
        self.read_collection(collection, |c| {
            c.map(|c| {
                c.values()
                    .filter(|d| d.field_str(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
        })
    }

    async fn delete(&self, collection: &CollectionName, id: &DocumentId) -> Result<(), StoreError> {
        self.check(collection, true).await?;
        let mut map = self
            .collections
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))?;
        if let Some(c) = map.get_mut(collection) {
            if c.remove(id).is_some() {
                self.mutations.fetch_add(1, Ordering::SeqCst);
            }
            if c.is_empty() {
                map.remove(collection);
            }
        }
        Ok(())
    }

    async fn list_all(&self, collection: &CollectionName) -> Result<Vec<Document>, StoreError> {
        self.check(collection, false).await?;
        self.read_collection(collection, |c| c.map(|c| c.values().cloned().collect()).unwrap_or_default())
    }
}

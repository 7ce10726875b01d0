//! In-memory resource store backing the hybrid search engine and
//! ingestion pipeline. Spec §1 scopes the real storage layer out as an
//! external collaborator; this is a minimal in-process stand-in for
//! it, `DashMap`-backed per the concurrency model (spec §5), not a
//! reimplementation of a persistence layer.

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{NeoError, NeoResult};
use crate::types::Resource;

/// Concurrent resource table keyed by id. Readers and writers never
/// block each other's access to distinct keys (`DashMap`'s sharded
/// locking), matching the non-blocking read path spec §5 calls for.
#[derive(Default)]
pub struct ResourceStore {
    resources: DashMap<Uuid, Resource>,
}

impl ResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, resource: Resource) -> NeoResult<()> {
        resource.validate()?;
        self.resources.insert(resource.id, resource);
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<Resource> {
        self.resources.get(&id).map(|r| r.clone())
    }

    pub fn remove(&self, id: Uuid) -> NeoResult<Resource> {
        self.resources
            .remove(&id)
            .map(|(_, r)| r)
            .ok_or_else(|| NeoError::NotFound(format!("resource {id} not found")))
    }

    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut Resource)) -> NeoResult<Resource> {
        let mut entry = self
            .resources
            .get_mut(&id)
            .ok_or_else(|| NeoError::NotFound(format!("resource {id} not found")))?;
        f(&mut entry);
        entry.validate()?;
        Ok(entry.clone())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Snapshot of every stored resource, in arbitrary order — the
    /// candidate corpus the hybrid search engine filters and ranks.
    pub fn snapshot(&self) -> Vec<Resource> {
        self.resources.iter().map(|r| r.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{IngestionStatus, QualityRecord, ReadStatus};
    use chrono::Utc;

    fn resource(title: &str) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            subject: vec![],
            creator: None,
            publisher: None,
            language: None,
            r#type: None,
            classification_code: None,
            read_status: ReadStatus::Unread,
            quality: QualityRecord::default(),
            embedding: None,
            sparse_embedding: None,
            sparse_embedding_model: None,
            sparse_embedding_updated_at: None,
            ingestion_status: IngestionStatus::Completed,
            ingestion_error: None,
            needs_quality_review: false,
            outlier_score: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let store = ResourceStore::new();
        let r = resource("Learning Rust");
        let id = r.id;
        store.insert(r).unwrap();
        assert_eq!(store.get(id).unwrap().title, "Learning Rust");
    }

    #[test]
    fn remove_missing_is_not_found() {
        let store = ResourceStore::new();
        let err = store.remove(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, NeoError::NotFound(_)));
    }

    #[test]
    fn update_applies_mutation_and_revalidates() {
        let store = ResourceStore::new();
        let r = resource("Original");
        let id = r.id;
        store.insert(r).unwrap();
        let updated = store
            .update(id, |res| res.title = "Renamed".to_string())
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(store.get(id).unwrap().title, "Renamed");
    }

    #[test]
    fn snapshot_reflects_all_inserted_resources() {
        let store = ResourceStore::new();
        store.insert(resource("A")).unwrap();
        store.insert(resource("B")).unwrap();
        assert_eq!(store.snapshot().len(), 2);
    }
}

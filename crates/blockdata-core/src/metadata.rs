//! Entity metadata stores

use crate::collaborators::{EntityMetadata, MetadataStore};
use crate::error::ExtractResult;
use crate::EntityId;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// Metadata store for deployments without entity metadata
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataStore for NoMetadata {
    fn get(&self, _entity_id: EntityId, _key: &str) -> ExtractResult<Option<Value>> {
        Ok(None)
    }

    fn get_all(&self, _entity_id: EntityId) -> ExtractResult<EntityMetadata> {
        Ok(EntityMetadata::new())
    }
}

/// Thread-safe in-memory metadata store
///
/// Keys hold lists of values; `set` replaces the list, `add` appends.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: RwLock<HashMap<EntityId, EntityMetadata>>,
}

impl InMemoryMetadataStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `key` with `value`
    pub fn set(&self, entity_id: EntityId, key: impl Into<String>, value: impl Into<Value>) {
        self.entries
            .write()
            .entry(entity_id)
            .or_default()
            .insert(key.into(), vec![value.into()]);
    }

    /// Append a value to `key`
    pub fn add(&self, entity_id: EntityId, key: impl Into<String>, value: impl Into<Value>) {
        self.entries
            .write()
            .entry(entity_id)
            .or_default()
            .entry(key.into())
            .or_default()
            .push(value.into());
    }

    /// Remove `key`, reporting whether it existed
    pub fn remove(&self, entity_id: EntityId, key: &str) -> bool {
        self.entries
            .write()
            .get_mut(&entity_id)
            .is_some_and(|meta| meta.remove(key).is_some())
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, entity_id: EntityId, key: &str) -> ExtractResult<Option<Value>> {
        Ok(self
            .entries
            .read()
            .get(&entity_id)
            .and_then(|meta| meta.get(key))
            .and_then(|values| values.first().cloned()))
    }

    fn get_all(&self, entity_id: EntityId) -> ExtractResult<EntityMetadata> {
        Ok(self
            .entries
            .read()
            .get(&entity_id)
            .cloned()
            .unwrap_or_default())
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use kvo_types::{Identifier, Record};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::keys::encode_identifier;
use crate::traits::{Capabilities, StorageBackend};

type Container = HashMap<String, Record>;

/// In-memory, HashMap-based backend (name `"array"`).
///
/// Intended for tests and embedding. Records are held per storage container
/// behind a `RwLock` and cloned on read/write. Capabilities are configurable
/// so the unit of work can be exercised against every combination.
///
/// A duplicate `insert` silently overwrites the existing record.
pub struct InMemoryBackend {
    capabilities: Capabilities,
    containers: RwLock<HashMap<String, Container>>,
}

impl InMemoryBackend {
    /// Full-record updates, composite keys supported but not required.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities {
            partial_updates: false,
            composite_primary_keys: true,
            requires_composite_primary_keys: false,
        })
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of records across all containers.
    pub fn len(&self) -> usize {
        self.containers
            .read()
            .map(|c| c.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record.
    pub fn clear(&self) -> StoreResult<()> {
        self.containers
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// All records of one container, in no particular order.
    pub fn records(&self, storage_name: &str) -> StoreResult<Vec<Record>> {
        let containers = self.containers.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(containers
            .get(storage_name)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn check_key(&self, id: &Identifier) -> StoreResult<()> {
        if id.is_composite() && !self.capabilities.composite_primary_keys {
            return Err(StoreError::CompositeKeyUnsupported(self.name().to_string()));
        }
        if !id.is_composite() && self.capabilities.requires_composite_primary_keys {
            return Err(StoreError::backend(
                self.name(),
                "composite primary key required",
            ));
        }
        Ok(())
    }

    fn write(&self, storage_name: &str, id: &Identifier, data: &Record, merge: bool) -> StoreResult<()> {
        self.check_key(id)?;
        let mut containers = self.containers.write().map_err(|_| StoreError::LockPoisoned)?;
        let container = containers.entry(storage_name.to_string()).or_default();
        let key = encode_identifier(id);
        match container.get_mut(&key) {
            Some(existing) if merge => {
                existing.extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            _ => {
                container.insert(key, data.clone());
            }
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryBackend {
    fn supports_partial_updates(&self) -> bool {
        self.capabilities.partial_updates
    }

    fn supports_composite_primary_keys(&self) -> bool {
        self.capabilities.composite_primary_keys
    }

    fn requires_composite_primary_keys(&self) -> bool {
        self.capabilities.requires_composite_primary_keys
    }

    fn insert(&self, storage_name: &str, id: &Identifier, data: &Record) -> StoreResult<()> {
        debug!(storage = storage_name, %id, "array insert");
        self.write(storage_name, id, data, false)
    }

    fn update(&self, storage_name: &str, id: &Identifier, data: &Record) -> StoreResult<()> {
        debug!(storage = storage_name, %id, fields = data.len(), "array update");
        self.write(storage_name, id, data, self.capabilities.partial_updates)
    }

    fn delete(&self, storage_name: &str, id: &Identifier) -> StoreResult<()> {
        self.check_key(id)?;
        let mut containers = self.containers.write().map_err(|_| StoreError::LockPoisoned)?;
        if let Some(container) = containers.get_mut(storage_name) {
            container.remove(&encode_identifier(id));
        }
        Ok(())
    }

    fn find(&self, storage_name: &str, id: &Identifier) -> StoreResult<Option<Record>> {
        self.check_key(id)?;
        let containers = self.containers.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(containers
            .get(storage_name)
            .and_then(|c| c.get(&encode_identifier(id)))
            .cloned())
    }

    fn name(&self) -> &str {
        "array"
    }
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("capabilities", &self.capabilities)
            .field("record_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn partial() -> InMemoryBackend {
        InMemoryBackend::with_capabilities(Capabilities {
            partial_updates: true,
            composite_primary_keys: true,
            requires_composite_primary_keys: false,
        })
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn insert_and_find() {
        let store = InMemoryBackend::new();
        let id = Identifier::from("1");
        let data = record(&[("id", json!("1")), ("headline", json!("a"))]);
        store.insert("post", &id, &data).unwrap();

        let found = store.find("post", &id).unwrap().expect("should exist");
        assert_eq!(found, data);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn find_missing_is_none() {
        let store = InMemoryBackend::new();
        assert!(store.find("post", &Identifier::from("1")).unwrap().is_none());
    }

    #[test]
    fn containers_are_separate() {
        let store = InMemoryBackend::new();
        let id = Identifier::from("1");
        store.insert("post", &id, &record(&[("id", json!("1"))])).unwrap();
        assert!(store.find("comment", &id).unwrap().is_none());
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let store = InMemoryBackend::new();
        let id = Identifier::from("1");
        store.insert("post", &id, &record(&[("a", json!(1))])).unwrap();
        store.insert("post", &id, &record(&[("b", json!(2))])).unwrap();
        let found = store.find("post", &id).unwrap().unwrap();
        assert_eq!(found, record(&[("b", json!(2))]));
    }

    #[test]
    fn full_update_replaces_record() {
        let store = InMemoryBackend::new();
        let id = Identifier::from("1");
        store
            .insert("post", &id, &record(&[("a", json!(1)), ("b", json!(2))]))
            .unwrap();
        store.update("post", &id, &record(&[("a", json!(3))])).unwrap();
        assert_eq!(
            store.find("post", &id).unwrap().unwrap(),
            record(&[("a", json!(3))])
        );
    }

    #[test]
    fn partial_update_merges_record() {
        let store = partial();
        let id = Identifier::from("1");
        store
            .insert("post", &id, &record(&[("a", json!(1)), ("b", json!(2))]))
            .unwrap();
        store.update("post", &id, &record(&[("a", json!(3))])).unwrap();
        assert_eq!(
            store.find("post", &id).unwrap().unwrap(),
            record(&[("a", json!(3)), ("b", json!(2))])
        );
    }

    #[test]
    fn update_of_missing_record_creates_it() {
        let store = partial();
        let id = Identifier::from("9");
        store.update("post", &id, &record(&[("a", json!(1))])).unwrap();
        assert!(store.find("post", &id).unwrap().is_some());
    }

    #[test]
    fn delete_removes_and_tolerates_missing() {
        let store = InMemoryBackend::new();
        let id = Identifier::from("1");
        store.insert("post", &id, &record(&[("a", json!(1))])).unwrap();
        store.delete("post", &id).unwrap();
        assert!(store.find("post", &id).unwrap().is_none());
        store.delete("post", &id).unwrap();
        store.delete("never", &id).unwrap();
        assert!(store.is_empty());
    }

    // -----------------------------------------------------------------------
    // Keys and capabilities
    // -----------------------------------------------------------------------

    #[test]
    fn numeric_and_string_keys_are_distinct() {
        let store = InMemoryBackend::new();
        store
            .insert("c", &Identifier::Single(json!(1)), &record(&[("n", json!(1))]))
            .unwrap();
        assert!(store.find("c", &Identifier::from("1")).unwrap().is_none());
    }

    #[test]
    fn composite_keys_rejected_when_unsupported() {
        let store = InMemoryBackend::with_capabilities(Capabilities {
            partial_updates: false,
            composite_primary_keys: false,
            requires_composite_primary_keys: false,
        });
        let id = Identifier::Composite(vec![("a".into(), json!(1)), ("b".into(), json!(2))]);
        let err = store.insert("r", &id, &Record::new()).unwrap_err();
        assert!(matches!(err, StoreError::CompositeKeyUnsupported(_)));
    }

    #[test]
    fn single_keys_rejected_when_composite_required() {
        let store = InMemoryBackend::with_capabilities(Capabilities {
            partial_updates: true,
            composite_primary_keys: true,
            requires_composite_primary_keys: true,
        });
        let err = store.find("r", &Identifier::from("1")).unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
    }

    #[test]
    fn capabilities_round_trip_through_trait() {
        let store = partial();
        let caps = store.capabilities();
        assert!(caps.partial_updates);
        assert!(caps.composite_primary_keys);
        assert!(!caps.requires_composite_primary_keys);
        assert_eq!(store.name(), "array");
    }

    #[test]
    fn records_and_clear() {
        let store = InMemoryBackend::new();
        store
            .insert("post", &Identifier::from("1"), &record(&[("id", json!("1"))]))
            .unwrap();
        store
            .insert("post", &Identifier::from("2"), &record(&[("id", json!("2"))]))
            .unwrap();
        assert_eq!(store.records("post").unwrap().len(), 2);
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.records("post").unwrap().is_empty());
    }
}

//! Call-recording decorator.
//!
//! [`RecordingBackend`] wraps any backend, logs every primitive call it
//! receives, and can be told to fail selected calls. It is the test double
//! used to assert exactly what the unit of work sends to storage.

use std::sync::Mutex;

use kvo_types::{Identifier, Record};
use serde::Serialize;

use crate::error::{StoreError, StoreResult};
use crate::traits::StorageBackend;

/// Kind of primitive call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Insert,
    Update,
    Delete,
    Find,
}

/// One recorded call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum StorageCall {
    Insert {
        storage: String,
        id: Identifier,
        data: Record,
    },
    Update {
        storage: String,
        id: Identifier,
        data: Record,
    },
    Delete {
        storage: String,
        id: Identifier,
    },
    Find {
        storage: String,
        id: Identifier,
    },
}

impl StorageCall {
    pub fn kind(&self) -> CallKind {
        match self {
            StorageCall::Insert { .. } => CallKind::Insert,
            StorageCall::Update { .. } => CallKind::Update,
            StorageCall::Delete { .. } => CallKind::Delete,
            StorageCall::Find { .. } => CallKind::Find,
        }
    }

    pub fn storage(&self) -> &str {
        match self {
            StorageCall::Insert { storage, .. }
            | StorageCall::Update { storage, .. }
            | StorageCall::Delete { storage, .. }
            | StorageCall::Find { storage, .. } => storage,
        }
    }

    pub fn id(&self) -> &Identifier {
        match self {
            StorageCall::Insert { id, .. }
            | StorageCall::Update { id, .. }
            | StorageCall::Delete { id, .. }
            | StorageCall::Find { id, .. } => id,
        }
    }
}

struct PlannedFailure {
    kind: CallKind,
    id: Option<Identifier>,
}

/// Backend decorator that records calls and injects failures.
///
/// Failed calls are recorded before the error is returned.
pub struct RecordingBackend<B> {
    inner: B,
    calls: Mutex<Vec<StorageCall>>,
    failures: Mutex<Vec<PlannedFailure>>,
}

impl<B: StorageBackend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls other than `find`.
    pub fn writes(&self) -> Vec<StorageCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind() != CallKind::Find)
            .collect()
    }

    /// Return and forget all recorded calls.
    pub fn take_calls(&self) -> Vec<StorageCall> {
        self.calls
            .lock()
            .map(|mut c| std::mem::take(&mut *c))
            .unwrap_or_default()
    }

    /// Number of recorded calls of one kind.
    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    /// Fail the next call of `kind` (optionally only for `id`), once.
    pub fn fail_on(&self, kind: CallKind, id: Option<Identifier>) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(PlannedFailure { kind, id });
        }
    }

    fn record(&self, call: StorageCall) -> StoreResult<()> {
        let kind = call.kind();
        let id = call.id().clone();
        self.calls
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?
            .push(call);

        let mut failures = self.failures.lock().map_err(|_| StoreError::LockPoisoned)?;
        let planned = failures
            .iter()
            .position(|f| f.kind == kind && f.id.as_ref().map_or(true, |fid| *fid == id));
        if let Some(index) = planned {
            failures.remove(index);
            return Err(StoreError::backend(
                self.inner.name(),
                format!("injected {kind:?} failure for {id}"),
            ));
        }
        Ok(())
    }
}

impl<B: StorageBackend> StorageBackend for RecordingBackend<B> {
    fn supports_partial_updates(&self) -> bool {
        self.inner.supports_partial_updates()
    }

    fn supports_composite_primary_keys(&self) -> bool {
        self.inner.supports_composite_primary_keys()
    }

    fn requires_composite_primary_keys(&self) -> bool {
        self.inner.requires_composite_primary_keys()
    }

    fn insert(&self, storage_name: &str, id: &Identifier, data: &Record) -> StoreResult<()> {
        self.record(StorageCall::Insert {
            storage: storage_name.to_string(),
            id: id.clone(),
            data: data.clone(),
        })?;
        self.inner.insert(storage_name, id, data)
    }

    fn update(&self, storage_name: &str, id: &Identifier, data: &Record) -> StoreResult<()> {
        self.record(StorageCall::Update {
            storage: storage_name.to_string(),
            id: id.clone(),
            data: data.clone(),
        })?;
        self.inner.update(storage_name, id, data)
    }

    fn delete(&self, storage_name: &str, id: &Identifier) -> StoreResult<()> {
        self.record(StorageCall::Delete {
            storage: storage_name.to_string(),
            id: id.clone(),
        })?;
        self.inner.delete(storage_name, id)
    }

    fn find(&self, storage_name: &str, id: &Identifier) -> StoreResult<Option<Record>> {
        self.record(StorageCall::Find {
            storage: storage_name.to_string(),
            id: id.clone(),
        })?;
        self.inner.find(storage_name, id)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<B: StorageBackend> std::fmt::Debug for RecordingBackend<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingBackend")
            .field("backend", &self.inner.name())
            .field("calls", &self.calls().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use serde_json::json;

    #[test]
    fn records_calls_in_order() {
        let store = RecordingBackend::new(InMemoryBackend::new());
        let id = Identifier::from("1");
        store.insert("post", &id, &Record::new()).unwrap();
        store.find("post", &id).unwrap();
        store.delete("post", &id).unwrap();

        let kinds: Vec<CallKind> = store.calls().iter().map(StorageCall::kind).collect();
        assert_eq!(kinds, vec![CallKind::Insert, CallKind::Find, CallKind::Delete]);
        assert_eq!(store.writes().len(), 2);
        assert_eq!(store.count(CallKind::Find), 1);
    }

    #[test]
    fn take_calls_drains() {
        let store = RecordingBackend::new(InMemoryBackend::new());
        store.find("post", &Identifier::from("1")).unwrap();
        assert_eq!(store.take_calls().len(), 1);
        assert!(store.calls().is_empty());
    }

    #[test]
    fn delegates_to_inner() {
        let store = RecordingBackend::new(InMemoryBackend::new());
        let id = Identifier::from("1");
        let mut data = Record::new();
        data.insert("id".into(), json!("1"));
        store.insert("post", &id, &data).unwrap();
        assert_eq!(store.inner().find("post", &id).unwrap(), Some(data));
        assert_eq!(store.name(), "array");
    }

    #[test]
    fn injected_failure_fires_once() {
        let store = RecordingBackend::new(InMemoryBackend::new());
        let id = Identifier::from("1");
        store.fail_on(CallKind::Insert, None);
        assert!(store.insert("post", &id, &Record::new()).is_err());
        assert!(store.insert("post", &id, &Record::new()).is_ok());
        assert_eq!(store.count(CallKind::Insert), 2);
    }

    #[test]
    fn injected_failure_can_target_an_identifier() {
        let store = RecordingBackend::new(InMemoryBackend::new());
        store.fail_on(CallKind::Delete, Some(Identifier::from("2")));
        store.delete("post", &Identifier::from("1")).unwrap();
        assert!(store.delete("post", &Identifier::from("2")).is_err());
    }

    #[test]
    fn calls_serialize_with_op_tag() {
        let call = StorageCall::Delete {
            storage: "post".into(),
            id: Identifier::from("1"),
        };
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(value, json!({"op": "delete", "storage": "post", "id": "1"}));
    }
}

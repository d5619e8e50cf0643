//! The unit of work: identity map, change tracking, and commit.
//!
//! [`UnitOfWork`] owns every piece of per-session bookkeeping:
//!
//! - the identity map, `(root class, identifier hash) -> object`, which
//!   guarantees one live instance per stored identity
//! - the identifiers each managed object was stored under
//! - the original data snapshot each object was loaded or last written with
//! - the objects scheduled for insertion and deletion
//!
//! Commit runs three phases in a fixed order (dirty-check updates, then
//! insertions, then deletions) against the storage backend. There is no
//! rollback: a failing backend call stops the commit where it is, and work
//! already applied stays applied.
//!
//! All state lives in unsynchronized maps. One unit of work serves one
//! logical session on one thread.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use kvo_mapping::{
    ClassDescriptor, IdConverter, Managed, Mapped, MappingError, MetadataRegistry, NullIdConverter,
};
use kvo_store::StorageBackend;
use kvo_types::{IdHash, Identifier, Key, ObjectHandle, Record, Value, TYPE_MARKER_FIELD};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{UnitError, UnitResult};
use crate::handler::{handler_for, IdHandler};

/// What happens to scheduled work when a commit fails part-way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitFailurePolicy {
    /// Each scheduled insertion or deletion leaves the schedule only once its
    /// own backend call succeeded. Failed and unattempted work is retried by
    /// the next commit.
    #[default]
    Retain,
    /// Both schedules are cleared after every commit, successful or not.
    /// Insertions dropped this way also release their identity-map slot.
    Discard,
}

/// Counts of storage writes issued by one successful commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    pub updated: usize,
    pub inserted: usize,
    pub deleted: usize,
}

impl CommitSummary {
    pub fn is_empty(&self) -> bool {
        self.updated == 0 && self.inserted == 0 && self.deleted == 0
    }
}

type IdentityMap = BTreeMap<String, BTreeMap<IdHash, Managed>>;

/// Tracks managed objects and translates their lifecycle into storage calls.
pub struct UnitOfWork {
    backend: Arc<dyn StorageBackend>,
    registry: MetadataRegistry,
    id_handler: Box<dyn IdHandler>,
    id_converter: Box<dyn IdConverter>,
    failure_policy: CommitFailurePolicy,
    strict_unmapped_fields: bool,

    identity_map: IdentityMap,
    identifiers: HashMap<ObjectHandle, Identifier>,
    original_data: HashMap<ObjectHandle, Record>,
    scheduled_insertions: Vec<Managed>,
    scheduled_deletions: Vec<Managed>,
}

impl UnitOfWork {
    /// Create an empty unit of work. The identifier strategy is chosen here,
    /// once, from the backend's composite-key capability.
    pub fn new(backend: Arc<dyn StorageBackend>, registry: MetadataRegistry) -> Self {
        let id_handler = handler_for(backend.supports_composite_primary_keys());
        Self {
            backend,
            registry,
            id_handler,
            id_converter: Box::new(NullIdConverter),
            failure_policy: CommitFailurePolicy::default(),
            strict_unmapped_fields: false,
            identity_map: BTreeMap::new(),
            identifiers: HashMap::new(),
            original_data: HashMap::new(),
            scheduled_insertions: Vec::new(),
            scheduled_deletions: Vec::new(),
        }
    }

    pub fn with_id_converter(mut self, converter: Box<dyn IdConverter>) -> Self {
        self.id_converter = converter;
        self
    }

    pub fn with_failure_policy(mut self, policy: CommitFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Fail hydration on stored fields the object can neither map nor keep
    /// in its additional-fields bag, instead of dropping them with a warning.
    pub fn with_strict_unmapped_fields(mut self, strict: bool) -> Self {
        self.strict_unmapped_fields = strict;
        self
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut MetadataRegistry {
        &mut self.registry
    }

    pub fn id_handler(&self) -> &dyn IdHandler {
        self.id_handler.as_ref()
    }

    pub fn failure_policy(&self) -> CommitFailurePolicy {
        self.failure_policy
    }

    // ---------------------------------------------------------------
    // Lookup and hydration
    // ---------------------------------------------------------------

    /// Find an object of class `T` by key.
    ///
    /// Registers `T` on first use. Fails with [`UnitError::TypeMismatch`] if
    /// the stored record is a subclass of `T` rather than `T` itself; use
    /// [`UnitOfWork::find_dyn`] to load polymorphic hierarchies.
    pub fn find<T: Mapped>(&mut self, key: impl Into<Key>) -> UnitResult<Rc<RefCell<T>>> {
        self.registry.register::<T>()?;
        let managed = self.find_dyn(T::CLASS, key)?;
        managed.downcast::<T>().ok_or_else(|| UnitError::TypeMismatch {
            requested: T::CLASS.to_string(),
            found: managed.class_name(),
        })
    }

    /// Find an object of a registered class, or any of its subclasses.
    ///
    /// Repeated finds of the same identity return the same instance without
    /// another storage round trip.
    pub fn find_dyn(&mut self, class: &str, key: impl Into<Key>) -> UnitResult<Managed> {
        let descriptor = self.registry.descriptor(class)?;
        let id = self.id_handler.normalize_id(&descriptor, key.into())?;
        let hash = self.id_handler.hash(&id);

        if let Some(existing) = self.lookup(class, &hash)? {
            self.check_class(class, &existing.class_name())?;
            return Ok(existing);
        }

        let storage_id = self.id_converter.serialize(&descriptor, id.clone());
        debug!(class, storage = descriptor.storage_name(), id = %storage_id, "find");
        let data = self
            .backend
            .find(descriptor.storage_name(), &storage_id)?
            .ok_or_else(|| UnitError::NotFound {
                class: class.to_string(),
                id: id.to_string(),
            })?;

        self.create_entity(&descriptor, storage_id, hash, data)
    }

    /// A managed object for `key`, if one is already in the identity map.
    /// Never touches storage.
    pub fn try_get_by_id(&self, class: &str, key: impl Into<Key>) -> UnitResult<Option<Managed>> {
        let descriptor = self.registry.descriptor(class)?;
        let id = self.id_handler.normalize_id(&descriptor, key.into())?;
        let hash = self.id_handler.hash(&id);
        self.lookup(class, &hash)
    }

    /// Hydrate stored data into a new managed object and register it.
    ///
    /// `data` is the raw record from storage, type marker included.
    fn create_entity(
        &mut self,
        requested: &ClassDescriptor,
        storage_id: Identifier,
        hash: IdHash,
        mut data: Record,
    ) -> UnitResult<Managed> {
        let descriptor = match data.remove(TYPE_MARKER_FIELD) {
            Some(marker) => self.resolve_marker(requested, marker)?,
            None => self.registry.descriptor(requested.name())?,
        };

        let object = self.registry.instantiate(descriptor.name())?;
        let original = data.clone();
        let data = self.id_converter.unserialize(&descriptor, data);
        self.hydrate(&descriptor, &object, data)?;

        let handle = object.handle();
        let root = self.registry.root_of(descriptor.name())?.to_string();
        self.original_data.insert(handle, original);
        self.identifiers.insert(handle, storage_id);
        self.identity_map
            .entry(root)
            .or_default()
            .insert(hash, object.clone());

        debug!(class = descriptor.name(), ?handle, "hydrated");
        Ok(object)
    }

    fn resolve_marker(&self, requested: &ClassDescriptor, marker: Value) -> UnitResult<Rc<ClassDescriptor>> {
        let found = match marker {
            Value::String(name) => name,
            other => {
                return Err(UnitError::TypeMismatch {
                    requested: requested.name().to_string(),
                    found: other.to_string(),
                })
            }
        };
        if found != requested.name() && !self.registry.is_subclass_of(&found, requested.name()) {
            return Err(UnitError::TypeMismatch {
                requested: requested.name().to_string(),
                found,
            });
        }
        Ok(self.registry.descriptor(&found)?)
    }

    fn hydrate(&self, descriptor: &ClassDescriptor, object: &Managed, data: Record) -> UnitResult<()> {
        let mut entity = object.borrow_mut();
        for (field, value) in data {
            if descriptor.has_field(&field) {
                entity.set_field(&field, value)?;
            } else if let Some(extra) = entity.additional_fields_mut() {
                extra.insert(field, value);
            } else if self.strict_unmapped_fields {
                return Err(MappingError::UnknownField {
                    class: descriptor.name().to_string(),
                    field,
                }
                .into());
            } else {
                warn!(class = descriptor.name(), field = %field, "dropping unmapped stored field");
            }
        }
        Ok(())
    }

    fn lookup(&self, class: &str, hash: &IdHash) -> UnitResult<Option<Managed>> {
        let root = self.registry.root_of(class)?;
        Ok(self
            .identity_map
            .get(root)
            .and_then(|slots| slots.get(hash))
            .cloned())
    }

    fn check_class(&self, requested: &str, found: &str) -> UnitResult<()> {
        if found == requested || self.registry.is_subclass_of(found, requested) {
            Ok(())
        } else {
            Err(UnitError::TypeMismatch {
                requested: requested.to_string(),
                found: found.to_string(),
            })
        }
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    /// Schedule a new object for insertion on the next commit.
    ///
    /// A no-op for objects that are already managed or already scheduled.
    /// The identity-map slot is claimed immediately, so a second object with
    /// the same identifier is rejected here rather than at commit.
    pub fn schedule_for_insert(&mut self, object: &Managed) -> UnitResult<()> {
        let handle = object.handle();
        if self.identifiers.contains_key(&handle) || self.is_scheduled_for_insert(object) {
            return Ok(());
        }

        let class = object.class_name();
        let descriptor = self.registry.descriptor(&class)?;
        let id = self
            .id_handler
            .get_identifier(&descriptor, &*object.borrow());
        if id.is_empty() {
            return Err(UnitError::MissingIdentifier { class });
        }

        let hash = self.id_handler.hash(&id);
        let root = self.registry.root_of(&class)?.to_string();
        let slots = self.identity_map.entry(root).or_default();
        if slots.contains_key(&hash) {
            return Err(UnitError::DuplicateIdentifier {
                class,
                id: id.to_string(),
            });
        }

        slots.insert(hash, object.clone());
        self.scheduled_insertions.push(object.clone());
        debug!(class = %class, %id, "scheduled insert");
        Ok(())
    }

    /// Schedule a managed object for deletion on the next commit.
    ///
    /// The object stays in the identity map until its delete succeeds.
    pub fn schedule_for_delete(&mut self, object: &Managed) -> UnitResult<()> {
        if !self.identifiers.contains_key(&object.handle()) {
            return Err(UnitError::UnmanagedObject {
                class: object.class_name(),
            });
        }
        if !self.is_scheduled_for_delete(object) {
            self.scheduled_deletions.push(object.clone());
        }
        Ok(())
    }

    pub fn is_scheduled_for_insert(&self, object: &Managed) -> bool {
        self.scheduled_insertions.iter().any(|o| o.ptr_eq(object))
    }

    pub fn is_scheduled_for_delete(&self, object: &Managed) -> bool {
        self.scheduled_deletions.iter().any(|o| o.ptr_eq(object))
    }

    /// Whether the object occupies a slot in the identity map.
    pub fn contains(&self, object: &Managed) -> bool {
        self.identity_map
            .values()
            .flat_map(BTreeMap::values)
            .any(|o| o.ptr_eq(object))
    }

    /// The identifier a managed object is stored under.
    pub fn identifier_of(&self, object: &Managed) -> Option<&Identifier> {
        self.identifiers.get(&object.handle())
    }

    /// Number of objects in the identity map.
    pub fn managed_count(&self) -> usize {
        self.identity_map.values().map(BTreeMap::len).sum()
    }

    pub fn scheduled_insertion_count(&self) -> usize {
        self.scheduled_insertions.len()
    }

    pub fn scheduled_deletion_count(&self) -> usize {
        self.scheduled_deletions.len()
    }

    // ---------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------

    /// Write all pending changes: updates for dirty objects, then scheduled
    /// insertions, then scheduled deletions.
    ///
    /// The first backend error stops the commit and is returned unmodified.
    /// What stays scheduled afterwards is governed by the failure policy.
    pub fn commit(&mut self) -> UnitResult<CommitSummary> {
        let mut summary = CommitSummary::default();
        let result = self.run_commit(&mut summary);

        if self.failure_policy == CommitFailurePolicy::Discard {
            self.discard_schedules();
        }

        match &result {
            Ok(()) => info!(
                updated = summary.updated,
                inserted = summary.inserted,
                deleted = summary.deleted,
                "commit complete"
            ),
            Err(e) => warn!(
                error = %e,
                updated = summary.updated,
                inserted = summary.inserted,
                deleted = summary.deleted,
                pending_inserts = self.scheduled_insertions.len(),
                pending_deletes = self.scheduled_deletions.len(),
                "commit failed"
            ),
        }
        result.map(|()| summary)
    }

    fn run_commit(&mut self, summary: &mut CommitSummary) -> UnitResult<()> {
        summary.updated = self.process_changes()?;
        summary.inserted = self.process_insertions()?;
        summary.deleted = self.process_deletions()?;
        Ok(())
    }

    /// Phase 1: diff every managed object against its snapshot.
    fn process_changes(&mut self) -> UnitResult<usize> {
        let candidates: Vec<Managed> = self
            .identity_map
            .values()
            .flat_map(BTreeMap::values)
            .filter(|o| !self.is_scheduled_for_insert(o))
            .cloned()
            .collect();

        let partial = self.backend.supports_partial_updates();
        let mut updated = 0;
        for object in candidates {
            let handle = object.handle();
            let Some(id) = self.identifiers.get(&handle).cloned() else {
                continue;
            };
            let descriptor = self.registry.descriptor(&object.class_name())?;
            let Some(mut change_set) = self.compute_change_set(&descriptor, &object, partial) else {
                continue;
            };
            change_set.insert(
                TYPE_MARKER_FIELD.to_string(),
                Value::String(descriptor.name().to_string()),
            );

            debug!(
                class = descriptor.name(),
                storage = descriptor.storage_name(),
                %id,
                fields = change_set.len(),
                "update"
            );
            self.backend
                .update(descriptor.storage_name(), &id, &change_set)?;

            if partial {
                self.original_data
                    .entry(handle)
                    .or_default()
                    .extend(change_set);
            } else {
                self.original_data.insert(handle, change_set);
            }
            updated += 1;
        }
        Ok(updated)
    }

    /// Changed value fields, or the full merged record when the backend
    /// cannot apply partial updates. `None` when nothing changed.
    fn compute_change_set(
        &self,
        descriptor: &ClassDescriptor,
        object: &Managed,
        partial: bool,
    ) -> Option<Record> {
        let empty = Record::new();
        let original = self.original_data.get(&object.handle()).unwrap_or(&empty);
        let snapshot = value_snapshot(descriptor, object);

        let changes: Record = snapshot
            .into_iter()
            .filter(|(field, value)| original.get(field) != Some(value))
            .collect();
        if changes.is_empty() {
            return None;
        }
        if partial {
            return Some(changes);
        }
        let mut merged = original.clone();
        merged.extend(changes);
        Some(merged)
    }

    /// Phase 2: write scheduled insertions.
    fn process_insertions(&mut self) -> UnitResult<usize> {
        let pending = self.scheduled_insertions.clone();
        let mut inserted = 0;
        for object in pending {
            let class = object.class_name();
            let descriptor = self.registry.descriptor(&class)?;
            let id = self
                .id_handler
                .get_identifier(&descriptor, &*object.borrow());
            if id.is_empty() {
                return Err(UnitError::MissingIdentifier { class });
            }
            let storage_id = self.id_converter.serialize(&descriptor, id.clone());
            if storage_id.is_empty() {
                return Err(UnitError::MissingIdentifier { class });
            }

            // The identifier may have been edited since the slot was claimed.
            let handle = object.handle();
            let hash = self.id_handler.hash(&id);
            let root = self.registry.root_of(&class)?.to_string();
            if let Some(holder) = self.identity_map.get(&root).and_then(|slots| slots.get(&hash)) {
                if holder.handle() != handle {
                    return Err(UnitError::DuplicateIdentifier {
                        class,
                        id: id.to_string(),
                    });
                }
            }

            let mut data = full_snapshot(&descriptor, &object);
            data.insert(TYPE_MARKER_FIELD.to_string(), Value::String(class.clone()));

            debug!(class = %class, storage = descriptor.storage_name(), id = %storage_id, "insert");
            self.backend
                .insert(descriptor.storage_name(), &storage_id, &data)?;

            let slots = self.identity_map.entry(root).or_default();
            slots.retain(|_, o| o.handle() != handle);
            slots.insert(hash, object.clone());
            self.original_data.insert(handle, data);
            self.identifiers.insert(handle, storage_id);
            self.scheduled_insertions.retain(|o| o.handle() != handle);
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Phase 3: write scheduled deletions and detach the deleted objects.
    fn process_deletions(&mut self) -> UnitResult<usize> {
        let pending = self.scheduled_deletions.clone();
        let mut deleted = 0;
        for object in pending {
            let handle = object.handle();
            let Some(id) = self.identifiers.get(&handle).cloned() else {
                self.scheduled_deletions.retain(|o| o.handle() != handle);
                continue;
            };
            let class = object.class_name();
            let descriptor = self.registry.descriptor(&class)?;

            debug!(class = %class, storage = descriptor.storage_name(), %id, "delete");
            self.backend.delete(descriptor.storage_name(), &id)?;

            self.identifiers.remove(&handle);
            self.original_data.remove(&handle);
            self.release_slot(&class, handle)?;
            self.scheduled_deletions.retain(|o| o.handle() != handle);
            deleted += 1;
        }
        Ok(deleted)
    }

    fn release_slot(&mut self, class: &str, handle: ObjectHandle) -> UnitResult<()> {
        let root = self.registry.root_of(class)?;
        if let Some(slots) = self.identity_map.get_mut(root) {
            slots.retain(|_, o| o.handle() != handle);
        }
        Ok(())
    }

    fn discard_schedules(&mut self) {
        let dropped: Vec<Managed> = std::mem::take(&mut self.scheduled_insertions);
        for object in dropped {
            let handle = object.handle();
            if !self.identifiers.contains_key(&handle) {
                for slots in self.identity_map.values_mut() {
                    slots.retain(|_, o| o.handle() != handle);
                }
            }
        }
        self.scheduled_deletions.clear();
    }

    /// Detach every managed object and drop all pending work. No storage
    /// calls are made.
    pub fn clear(&mut self) {
        self.scheduled_insertions.clear();
        self.scheduled_deletions.clear();
        self.identifiers.clear();
        self.original_data.clear();
        self.identity_map.clear();
        debug!("unit of work cleared");
    }
}

/// Current values of the mapped non-identifier fields, plus the entries of
/// the additional-fields bag. Mapped fields win over bag entries of the same
/// name.
fn value_snapshot(descriptor: &ClassDescriptor, object: &Managed) -> Record {
    let entity = object.borrow();
    let mut snapshot: Record = descriptor
        .value_fields()
        .map(|field| (field.to_string(), entity.field(field).unwrap_or(Value::Null)))
        .collect();
    merge_additional_fields(&mut snapshot, entity.additional_fields());
    snapshot
}

/// Current values of every mapped field, identifiers included, plus the
/// additional-fields bag.
fn full_snapshot(descriptor: &ClassDescriptor, object: &Managed) -> Record {
    let entity = object.borrow();
    let mut snapshot: Record = descriptor
        .fields()
        .map(|f| (f.name.clone(), entity.field(&f.name).unwrap_or(Value::Null)))
        .collect();
    merge_additional_fields(&mut snapshot, entity.additional_fields());
    snapshot
}

fn merge_additional_fields(snapshot: &mut Record, extra: Option<&Record>) {
    for (field, value) in extra.into_iter().flatten() {
        if field != TYPE_MARKER_FIELD {
            snapshot.entry(field.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("backend", &self.backend.name())
            .field("id_handler", &self.id_handler.name())
            .field("managed", &self.managed_count())
            .field("scheduled_insertions", &self.scheduled_insertions.len())
            .field("scheduled_deletions", &self.scheduled_deletions.len())
            .finish()
    }
}

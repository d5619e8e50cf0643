use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use kvo_mapping::{ClassDescriptor, IdConverter, Managed, Mapped, MappingError, MetadataRegistry};
use kvo_store::StorageBackend;
use kvo_types::Key;
use kvo_unit::{CommitSummary, UnitOfWork};
use tracing::debug;

use crate::config::ManagerConfig;
use crate::error::{SdkError, SdkResult};
use crate::repository::EntityRepository;

/// Entry point for working with mapped objects against one backend.
///
/// Wraps a [`UnitOfWork`]; every object returned by or handed to a manager
/// is tracked by that unit of work until [`EntityManager::clear`] or a
/// flushed removal detaches it.
pub struct EntityManager {
    uow: UnitOfWork,
    config: ManagerConfig,
}

impl EntityManager {
    pub fn new(backend: Arc<dyn StorageBackend>, config: ManagerConfig) -> Self {
        Self::with_unit_of_work(UnitOfWork::new(backend, MetadataRegistry::new()), config)
    }

    fn with_unit_of_work(uow: UnitOfWork, config: ManagerConfig) -> Self {
        let uow = uow
            .with_failure_policy(config.commit_failure_policy)
            .with_strict_unmapped_fields(config.strict_unmapped_fields);
        debug!(
            backend = uow.backend().name(),
            id_handler = uow.id_handler().name(),
            "entity manager created"
        );
        Self { uow, config }
    }

    pub fn builder() -> EntityManagerBuilder {
        EntityManagerBuilder::default()
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ---- Metadata ----

    /// Register a mapped type, rejecting key shapes the backend cannot store.
    pub fn register<T: Mapped>(&mut self) -> SdkResult<Rc<ClassDescriptor>> {
        if let Ok(existing) = self.uow.registry().descriptor(T::CLASS) {
            return Ok(existing);
        }
        let descriptor = T::descriptor()?;
        self.check_key_shape(&descriptor)?;
        Ok(self.uow.registry_mut().register::<T>()?)
    }

    pub fn class_descriptor(&self, class: &str) -> SdkResult<Rc<ClassDescriptor>> {
        Ok(self.uow.registry().descriptor(class)?)
    }

    fn check_key_shape(&self, descriptor: &ClassDescriptor) -> SdkResult<()> {
        let backend = self.uow.backend();
        if descriptor.is_composite() && !backend.supports_composite_primary_keys() {
            return Err(SdkError::CompositeKeyUnsupported {
                class: descriptor.name().to_string(),
                backend: backend.name().to_string(),
            });
        }
        if !descriptor.is_composite() && backend.requires_composite_primary_keys() {
            return Err(SdkError::CompositeKeyRequired {
                class: descriptor.name().to_string(),
                backend: backend.name().to_string(),
            });
        }
        Ok(())
    }

    fn ensure_registered<T: Mapped>(&mut self) -> SdkResult<()> {
        if self.uow.registry().is_registered(T::CLASS) {
            return Ok(());
        }
        if !self.config.auto_register {
            return Err(MappingError::UnknownClass(T::CLASS.to_string()).into());
        }
        self.register::<T>().map(|_| ())
    }

    // ---- Object operations ----

    /// Find an object by key. Repeated finds return the same instance.
    pub fn find<T: Mapped>(&mut self, key: impl Into<Key>) -> SdkResult<Rc<RefCell<T>>> {
        self.ensure_registered::<T>()?;
        Ok(self.uow.find::<T>(key)?)
    }

    /// Find by class name, hydrating whichever registered subclass the
    /// stored record names.
    pub fn find_dyn(&mut self, class: &str, key: impl Into<Key>) -> SdkResult<Managed> {
        Ok(self.uow.find_dyn(class, key)?)
    }

    /// Schedule a new object for insertion on the next flush.
    pub fn persist<T: Mapped>(&mut self, object: &Rc<RefCell<T>>) -> SdkResult<()> {
        self.ensure_registered::<T>()?;
        self.persist_managed(&Managed::from_rc(object.clone()))
    }

    /// Schedule an object of an already registered class for insertion.
    pub fn persist_managed(&mut self, object: &Managed) -> SdkResult<()> {
        Ok(self.uow.schedule_for_insert(object)?)
    }

    /// Schedule a managed object for deletion on the next flush.
    pub fn remove<T: Mapped>(&mut self, object: &Rc<RefCell<T>>) -> SdkResult<()> {
        self.remove_managed(&Managed::from_rc(object.clone()))
    }

    pub fn remove_managed(&mut self, object: &Managed) -> SdkResult<()> {
        Ok(self.uow.schedule_for_delete(object)?)
    }

    /// Whether the object is tracked by this manager.
    pub fn contains<T: Mapped>(&self, object: &Rc<RefCell<T>>) -> bool {
        self.uow.contains(&Managed::from_rc(object.clone()))
    }

    /// Write every pending change to the backend.
    pub fn flush(&mut self) -> SdkResult<CommitSummary> {
        Ok(self.uow.commit()?)
    }

    /// Detach every managed object and drop pending work.
    pub fn clear(&mut self) {
        self.uow.clear();
    }

    pub fn repository<T: Mapped>(&mut self) -> EntityRepository<'_, T> {
        EntityRepository::new(self)
    }

    // ---- Accessors ----

    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    pub fn unit_of_work_mut(&mut self) -> &mut UnitOfWork {
        &mut self.uow
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.uow.backend()
    }
}

impl fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityManager")
            .field("config", &self.config)
            .field("unit_of_work", &self.uow)
            .finish()
    }
}

type Registration = fn(&mut EntityManager) -> SdkResult<()>;

fn register_class<T: Mapped>(manager: &mut EntityManager) -> SdkResult<()> {
    manager.register::<T>().map(|_| ())
}

/// Builder for [`EntityManager`].
#[derive(Default)]
pub struct EntityManagerBuilder {
    backend: Option<Arc<dyn StorageBackend>>,
    config: ManagerConfig,
    id_converter: Option<Box<dyn IdConverter>>,
    registrations: Vec<Registration>,
}

impl EntityManagerBuilder {
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id_converter(mut self, converter: Box<dyn IdConverter>) -> Self {
        self.id_converter = Some(converter);
        self
    }

    /// Register `T` when the manager is built.
    pub fn register<T: Mapped>(mut self) -> Self {
        self.registrations.push(register_class::<T>);
        self
    }

    pub fn build(self) -> SdkResult<EntityManager> {
        let backend = self
            .backend
            .ok_or_else(|| SdkError::Config("no storage backend configured".into()))?;
        let mut uow = UnitOfWork::new(backend, MetadataRegistry::new());
        if let Some(converter) = self.id_converter {
            uow = uow.with_id_converter(converter);
        }
        let mut manager = EntityManager::with_unit_of_work(uow, self.config);
        for registration in self.registrations {
            registration(&mut manager)?;
        }
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvo_mapping::fixtures::{Article, Comment, Post, Reading};
    use kvo_store::{CallKind, Capabilities, InMemoryBackend, RecordingBackend, StorageCall};
    use kvo_types::{Identifier, Record, Value, TYPE_MARKER_FIELD};
    use kvo_unit::{CommitFailurePolicy, UnitError};
    use serde_json::json;

    type Backend = RecordingBackend<InMemoryBackend>;

    fn backend(partial_updates: bool) -> Arc<Backend> {
        Arc::new(RecordingBackend::new(InMemoryBackend::with_capabilities(Capabilities {
            partial_updates,
            composite_primary_keys: false,
            requires_composite_primary_keys: false,
        })))
    }

    fn manager(backend: &Arc<Backend>) -> EntityManager {
        EntityManager::new(backend.clone(), ManagerConfig::default())
    }

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn post(id: &str, headline: &str) -> Rc<RefCell<Post>> {
        Rc::new(RefCell::new(Post::new(id, headline)))
    }

    fn post_lifecycle(partial_updates: bool) -> Vec<StorageCall> {
        let store = backend(partial_updates);
        let mut em = manager(&store);

        let p = post("1", "a");
        em.persist(&p).unwrap();
        em.flush().unwrap();

        p.borrow_mut().headline = "b".into();
        em.flush().unwrap();

        em.remove(&p).unwrap();
        em.flush().unwrap();
        store.calls()
    }

    #[test]
    fn post_lifecycle_with_partial_updates() {
        assert_eq!(
            post_lifecycle(true),
            vec![
                StorageCall::Insert {
                    storage: "post".into(),
                    id: Identifier::from("1"),
                    data: record(&[
                        ("id", json!("1")),
                        ("headline", json!("a")),
                        (TYPE_MARKER_FIELD, json!("Post")),
                    ]),
                },
                StorageCall::Update {
                    storage: "post".into(),
                    id: Identifier::from("1"),
                    data: record(&[("headline", json!("b")), (TYPE_MARKER_FIELD, json!("Post"))]),
                },
                StorageCall::Delete {
                    storage: "post".into(),
                    id: Identifier::from("1"),
                },
            ]
        );
    }

    #[test]
    fn post_lifecycle_with_full_updates() {
        let calls = post_lifecycle(false);
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[1],
            StorageCall::Update {
                storage: "post".into(),
                id: Identifier::from("1"),
                data: record(&[
                    ("id", json!("1")),
                    ("headline", json!("b")),
                    (TYPE_MARKER_FIELD, json!("Post")),
                ]),
            }
        );
    }

    #[test]
    fn find_after_persist_returns_the_persisted_instance() {
        let store = backend(true);
        let mut em = manager(&store);
        let p = post("1", "a");
        em.persist(&p).unwrap();
        em.flush().unwrap();

        let found = em.find::<Post>("1").unwrap();
        assert!(Rc::ptr_eq(&found, &p));
        assert!(em.contains(&p));
        assert_eq!(store.count(CallKind::Find), 0);
    }

    #[test]
    fn clear_forces_a_new_round_trip() {
        let store = backend(true);
        let mut em = manager(&store);
        em.persist(&post("1", "a")).unwrap();
        em.flush().unwrap();
        em.clear();

        let found = em.find::<Post>("1").unwrap();
        assert_eq!(found.borrow().headline, "a");
        assert_eq!(store.count(CallKind::Find), 1);
    }

    #[test]
    fn not_found_is_reported() {
        let store = backend(true);
        let mut em = manager(&store);
        let err = em.find::<Post>("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn duplicate_persist_is_rejected() {
        let store = backend(true);
        let mut em = manager(&store);
        em.persist(&post("1", "a")).unwrap();
        let err = em.persist(&post("1", "b")).unwrap_err();
        assert!(matches!(
            err,
            SdkError::Unit(UnitError::DuplicateIdentifier { .. })
        ));
    }

    #[test]
    fn remove_of_unknown_object_is_rejected() {
        let store = backend(true);
        let mut em = manager(&store);
        let err = em.remove(&post("1", "a")).unwrap_err();
        assert!(matches!(err, SdkError::Unit(UnitError::UnmanagedObject { .. })));
    }

    #[test]
    fn find_dyn_resolves_subclasses() {
        let store = backend(true);
        let mut em = EntityManager::builder()
            .backend(store.clone())
            .register::<Post>()
            .register::<Article>()
            .build()
            .unwrap();
        let article = Rc::new(RefCell::new(Article {
            id: "9".into(),
            headline: "h".into(),
            body: None,
            author: "ann".into(),
        }));
        em.persist(&article).unwrap();
        em.flush().unwrap();
        em.clear();

        let found = em.find_dyn("Post", "9").unwrap();
        assert_eq!(found.class_name(), "Article");
    }

    #[test]
    fn builder_requires_a_backend() {
        let err = EntityManager::builder().build().unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn builder_registers_classes() {
        let store = backend(true);
        let em = EntityManager::builder()
            .backend(store)
            .register::<Post>()
            .register::<Comment>()
            .build()
            .unwrap();
        assert_eq!(em.class_descriptor("Comment").unwrap().storage_name(), "comment");
        assert_eq!(em.unit_of_work().registry().len(), 2);
    }

    #[test]
    fn builder_applies_config() {
        let store = backend(true);
        let config = ManagerConfig {
            commit_failure_policy: CommitFailurePolicy::Discard,
            ..ManagerConfig::default()
        };
        let em = EntityManager::builder()
            .backend(store)
            .config(config.clone())
            .build()
            .unwrap();
        assert_eq!(em.config(), &config);
        assert_eq!(em.unit_of_work().failure_policy(), CommitFailurePolicy::Discard);
    }

    #[test]
    fn registration_is_required_without_auto_register() {
        let store = backend(true);
        let mut em = EntityManager::new(
            store,
            ManagerConfig {
                auto_register: false,
                ..ManagerConfig::default()
            },
        );
        let err = em.persist(&post("1", "a")).unwrap_err();
        assert!(matches!(err, SdkError::Mapping(MappingError::UnknownClass(_))));
        assert!(em.find::<Post>("1").is_err());

        em.register::<Post>().unwrap();
        em.persist(&post("1", "a")).unwrap();
    }

    #[test]
    fn composite_class_rejected_without_backend_support() {
        let store = backend(true);
        let mut em = manager(&store);
        let err = em.register::<Reading>().unwrap_err();
        assert!(matches!(err, SdkError::CompositeKeyUnsupported { .. }));
        assert!(em.class_descriptor("Reading").is_err());
    }

    #[test]
    fn single_key_class_rejected_when_backend_requires_composite() {
        let store = Arc::new(InMemoryBackend::with_capabilities(Capabilities {
            partial_updates: true,
            composite_primary_keys: true,
            requires_composite_primary_keys: true,
        }));
        let mut em = EntityManager::new(store, ManagerConfig::default());
        assert!(matches!(
            em.register::<Post>(),
            Err(SdkError::CompositeKeyRequired { .. })
        ));
        em.register::<Reading>().unwrap();
    }

    #[test]
    fn composite_round_trip() {
        let store = Arc::new(InMemoryBackend::new());
        let mut em = EntityManager::new(store.clone(), ManagerConfig::default());
        em.persist(&Rc::new(RefCell::new(Reading::new("north", 3, 17))))
            .unwrap();
        em.flush().unwrap();
        em.clear();

        let key = Key::from_pairs([("range", json!(3)), ("dist", json!("north"))]);
        let reading = em.find::<Reading>(key).unwrap();
        assert_eq!(reading.borrow().celsius, 17);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repository_finds_through_the_manager() {
        let store = backend(true);
        let mut em = manager(&store);
        em.persist(&post("1", "a")).unwrap();
        em.flush().unwrap();

        let mut posts = em.repository::<Post>();
        assert_eq!(posts.find("1").unwrap().borrow().headline, "a");
        assert!(posts.find_optional("2").unwrap().is_none());
    }

    #[test]
    fn strict_config_rejects_unmapped_fields() {
        let store = backend(true);
        store
            .inner()
            .insert(
                "comment",
                &Identifier::Single(json!(1)),
                &record(&[("id", json!(1)), ("text", json!("t")), ("legacy", json!(true))]),
            )
            .unwrap();
        let mut em = EntityManager::new(
            store,
            ManagerConfig {
                strict_unmapped_fields: true,
                ..ManagerConfig::default()
            },
        );
        assert!(em.find::<Comment>(1i64).is_err());
    }
}

//! High-level API for kvo.
//!
//! [`EntityManager`] is the entry point for applications: it owns a unit of
//! work bound to one storage backend and exposes find, persist, remove,
//! flush, and clear over mapped types.

pub mod config;
pub mod error;
pub mod manager;
pub mod repository;

pub use config::ManagerConfig;
pub use error::{SdkError, SdkResult};
pub use manager::{EntityManager, EntityManagerBuilder};
pub use repository::EntityRepository;

// Re-export key types
pub use kvo_mapping::{ClassDescriptor, Entity, IdConverter, Managed, Mapped};
pub use kvo_store::{Capabilities, InMemoryBackend, StorageBackend};
pub use kvo_types::{Identifier, Key, Record, Value};
pub use kvo_unit::{CommitFailurePolicy, CommitSummary};

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use kvo_mapping::{ClassDescriptor, Mapped};
use kvo_types::Key;

use crate::error::SdkResult;
use crate::manager::EntityManager;

/// Typed lookups for one mapped class, borrowed from an [`EntityManager`].
pub struct EntityRepository<'a, T> {
    manager: &'a mut EntityManager,
    _class: PhantomData<fn() -> T>,
}

impl<'a, T: Mapped> EntityRepository<'a, T> {
    pub(crate) fn new(manager: &'a mut EntityManager) -> Self {
        Self {
            manager,
            _class: PhantomData,
        }
    }

    pub fn class_name(&self) -> &'static str {
        T::CLASS
    }

    pub fn descriptor(&mut self) -> SdkResult<Rc<ClassDescriptor>> {
        self.manager.register::<T>()
    }

    pub fn find(&mut self, key: impl Into<Key>) -> SdkResult<Rc<RefCell<T>>> {
        self.manager.find::<T>(key)
    }

    /// Like [`find`](Self::find), with a missing record mapped to `None`.
    pub fn find_optional(&mut self, key: impl Into<Key>) -> SdkResult<Option<Rc<RefCell<T>>>> {
        match self.manager.find::<T>(key) {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ManagerConfig;
    use kvo_mapping::fixtures::Post;
    use kvo_store::InMemoryBackend;

    #[test]
    fn descriptor_registers_on_demand() {
        let mut em = EntityManager::new(Arc::new(InMemoryBackend::new()), ManagerConfig::default());
        let mut posts = em.repository::<Post>();
        assert_eq!(posts.class_name(), "Post");
        assert_eq!(posts.descriptor().unwrap().storage_name(), "post");
    }

    #[test]
    fn find_optional_propagates_other_errors() {
        let mut em = EntityManager::new(Arc::new(InMemoryBackend::new()), ManagerConfig::default());
        let mut posts = em.repository::<Post>();
        let key = Key::from_pairs([("headline", serde_json::json!("x"))]);
        assert!(posts.find_optional(key).is_err());
    }
}

//! Reflective access to domain objects.
//!
//! Domain types implement [`Entity`] to expose their fields by name and
//! [`Mapped`] to describe themselves and produce blank instances for
//! hydration. The unit of work only ever sees type-erased [`Managed`]
//! handles, which share their allocation with the caller's `Rc<RefCell<T>>`.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use kvo_types::{ObjectHandle, Record, Value};
use serde::de::DeserializeOwned;

use crate::descriptor::ClassDescriptor;
use crate::error::{MappingError, MappingResult};

/// Field-level reflection over a persisted object.
pub trait Entity: Any {
    /// Concrete class name, matching the class's descriptor.
    fn class_name(&self) -> &str;

    /// Current value of a mapped field, or `None` if the field is unknown.
    fn field(&self, name: &str) -> Option<Value>;

    /// Assign a mapped field from a stored value.
    fn set_field(&mut self, name: &str, value: Value) -> MappingResult<()>;

    /// Bag of stored fields the class does not declare.
    ///
    /// Types that return `None` drop undeclared fields on hydration. Bag
    /// entries are written on insert and dirty-checked like mapped fields,
    /// so both accessors must expose the same bag.
    fn additional_fields(&self) -> Option<&Record> {
        None
    }

    fn additional_fields_mut(&mut self) -> Option<&mut Record> {
        None
    }
}

/// A type that can be registered with the metadata registry.
pub trait Mapped: Entity + Sized {
    /// Canonical class name, written as the type marker.
    const CLASS: &'static str;

    /// Describe the class. Called once per registry.
    fn descriptor() -> MappingResult<ClassDescriptor>;

    /// A blank instance to hydrate stored data into.
    fn instantiate() -> Self;
}

/// Decode a stored value into a field's Rust type.
pub fn decode_field<T: DeserializeOwned>(class: &str, field: &str, value: Value) -> MappingResult<T> {
    serde_json::from_value(value).map_err(|e| MappingError::FieldConversion {
        class: class.to_string(),
        field: field.to_string(),
        reason: e.to_string(),
    })
}

/// Error for a `set_field` call naming a field the type does not have.
pub fn unknown_field(class: &str, field: &str) -> MappingError {
    MappingError::UnknownField {
        class: class.to_string(),
        field: field.to_string(),
    }
}

/// Type-erased shared handle to a managed object.
///
/// Cloning is cheap and keeps pointing at the same object.
#[derive(Clone)]
pub struct Managed {
    entity: Rc<RefCell<dyn Entity>>,
    any: Rc<dyn Any>,
}

impl Managed {
    /// Wrap a fresh value.
    pub fn new<T: Entity>(value: T) -> Self {
        Self::from_rc(Rc::new(RefCell::new(value)))
    }

    /// Share an existing allocation.
    pub fn from_rc<T: Entity>(rc: Rc<RefCell<T>>) -> Self {
        let any: Rc<dyn Any> = rc.clone();
        Self { entity: rc, any }
    }

    pub fn handle(&self) -> ObjectHandle {
        ObjectHandle::of(&self.any)
    }

    pub fn borrow(&self) -> Ref<'_, dyn Entity> {
        self.entity.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn Entity> {
        self.entity.borrow_mut()
    }

    pub fn class_name(&self) -> String {
        self.entity.borrow().class_name().to_string()
    }

    /// Recover the typed handle, if the object is a `T`.
    pub fn downcast<T: Entity>(&self) -> Option<Rc<RefCell<T>>> {
        self.any.clone().downcast::<RefCell<T>>().ok()
    }

    /// Reference equality.
    pub fn ptr_eq(&self, other: &Managed) -> bool {
        self.handle() == other.handle()
    }
}

impl<T: Entity> From<Rc<RefCell<T>>> for Managed {
    fn from(rc: Rc<RefCell<T>>) -> Self {
        Self::from_rc(rc)
    }
}

impl fmt::Debug for Managed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self
            .entity
            .try_borrow()
            .map(|e| e.class_name().to_string())
            .unwrap_or_else(|_| "<borrowed>".to_string());
        f.debug_struct("Managed")
            .field("class", &class)
            .field("handle", &self.handle())
            .finish()
    }
}

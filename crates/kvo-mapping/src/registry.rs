//! Registry from type marker to class descriptor and constructor.
//!
//! Every class the unit of work hydrates must be registered here first.
//! Registration validates the descriptor once and caches it for the life of
//! the registry. Subclasses (single-table inheritance) are validated against
//! their parent at registration time, so hydration only needs a lookup.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::descriptor::ClassDescriptor;
use crate::entity::{Managed, Mapped};
use crate::error::{MappingError, MappingResult};

struct RegisteredClass {
    descriptor: Rc<ClassDescriptor>,
    factory: fn() -> Managed,
}

fn instantiate_managed<T: Mapped>() -> Managed {
    Managed::new(T::instantiate())
}

/// Registered classes, keyed by class name.
#[derive(Default)]
pub struct MetadataRegistry {
    classes: HashMap<String, RegisteredClass>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, returning its cached descriptor.
    ///
    /// Registering an already-known class is a no-op. A parent class must be
    /// registered before its subclasses.
    pub fn register<T: Mapped>(&mut self) -> MappingResult<Rc<ClassDescriptor>> {
        if let Some(class) = self.classes.get(T::CLASS) {
            return Ok(Rc::clone(&class.descriptor));
        }

        let mut descriptor = T::descriptor()?;
        if descriptor.name() != T::CLASS {
            return Err(MappingError::ClassNameMismatch {
                declared: T::CLASS.to_string(),
                described: descriptor.name().to_string(),
            });
        }

        if let Some(parent_name) = descriptor.parent().map(str::to_string) {
            let parent = self.descriptor(&parent_name).map_err(|_| MappingError::UnknownParent {
                class: T::CLASS.to_string(),
                parent: parent_name.clone(),
            })?;
            check_subclass(&mut descriptor, &parent)?;
        }

        debug!(
            class = T::CLASS,
            storage = descriptor.storage_name(),
            composite = descriptor.is_composite(),
            "registered class"
        );

        let descriptor = Rc::new(descriptor);
        self.classes.insert(
            T::CLASS.to_string(),
            RegisteredClass {
                descriptor: Rc::clone(&descriptor),
                factory: instantiate_managed::<T>,
            },
        );
        Ok(descriptor)
    }

    pub fn is_registered(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn descriptor(&self, class: &str) -> MappingResult<Rc<ClassDescriptor>> {
        self.classes
            .get(class)
            .map(|c| Rc::clone(&c.descriptor))
            .ok_or_else(|| MappingError::UnknownClass(class.to_string()))
    }

    /// Returns `true` if `class` is a strict descendant of `ancestor`.
    pub fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool {
        let mut current = self.classes.get(class).and_then(|c| c.descriptor.parent());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.classes.get(name).and_then(|c| c.descriptor.parent());
        }
        false
    }

    /// Top-most ancestor of `class`; the class itself if it has no parent.
    pub fn root_of<'a>(&'a self, class: &'a str) -> MappingResult<&'a str> {
        let mut name = class;
        loop {
            let registered = self
                .classes
                .get(name)
                .ok_or_else(|| MappingError::UnknownClass(name.to_string()))?;
            match registered.descriptor.parent() {
                Some(parent) => name = parent,
                None => return Ok(name),
            }
        }
    }

    /// A blank instance of a registered class.
    pub fn instantiate(&self, class: &str) -> MappingResult<Managed> {
        self.classes
            .get(class)
            .map(|c| (c.factory)())
            .ok_or_else(|| MappingError::UnknownClass(class.to_string()))
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.classes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Subclasses live in their parent's container and share its identifier.
fn check_subclass(child: &mut ClassDescriptor, parent: &ClassDescriptor) -> MappingResult<()> {
    if child.identifier() != parent.identifier() {
        return Err(MappingError::IncompatibleSubclass {
            class: child.name().to_string(),
            parent: parent.name().to_string(),
            what: "identifier fields",
        });
    }
    if !child.has_explicit_storage_name() {
        child.inherit_storage_name(parent.storage_name());
    } else if child.storage_name() != parent.storage_name() {
        return Err(MappingError::IncompatibleSubclass {
            class: child.name().to_string(),
            parent: parent.name().to_string(),
            what: "storage name",
        });
    }
    Ok(())
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("classes", &self.class_names())
            .finish()
    }
}

//! Class descriptors: the shape of one persisted type.
//!
//! A [`ClassDescriptor`] names the storage container, the ordered identifier
//! fields, and the mapped and transient fields of a class. Descriptors are
//! built once through [`ClassDescriptorBuilder`], which enforces that every
//! mapped class has at least one identifier field.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{MappingError, MappingResult};

/// One mapped field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Part of the identifier.
    pub id: bool,
}

/// Metadata for one persisted type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassDescriptor {
    name: String,
    storage_name: String,
    identifier: Vec<String>,
    composite: bool,
    fields: BTreeMap<String, FieldDescriptor>,
    transient: BTreeSet<String>,
    parent: Option<String>,
    #[serde(skip)]
    storage_explicit: bool,
}

impl ClassDescriptor {
    /// Start describing the class with the given canonical name.
    pub fn builder(name: impl Into<String>) -> ClassDescriptorBuilder {
        ClassDescriptorBuilder::new(name)
    }

    /// Canonical class name; also the value of the type marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage container the class's records live in.
    pub fn storage_name(&self) -> &str {
        &self.storage_name
    }

    /// Identifier field names in declaration order.
    pub fn identifier(&self) -> &[String] {
        &self.identifier
    }

    /// The first identifier field; the only one for non-composite classes.
    pub fn single_identifier(&self) -> &str {
        // The builder rejects classes without identifier fields.
        &self.identifier[0]
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    pub fn is_identifier(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|f| f.id)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All mapped fields, identifiers included, in name order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Mapped fields that are not part of the identifier.
    pub fn value_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .filter(|f| !f.id)
            .map(|f| f.name.as_str())
    }

    pub fn is_transient(&self, field: &str) -> bool {
        self.transient.contains(field)
    }

    pub fn transient_fields(&self) -> impl Iterator<Item = &str> {
        self.transient.iter().map(String::as_str)
    }

    /// Direct parent class for single-table inheritance.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Whether the storage name was set explicitly rather than defaulted.
    pub fn has_explicit_storage_name(&self) -> bool {
        self.storage_explicit
    }

    /// Adopt the parent's container; used when registering subclasses.
    pub(crate) fn inherit_storage_name(&mut self, storage_name: &str) {
        self.storage_name = storage_name.to_string();
    }
}

/// Builder for [`ClassDescriptor`].
#[derive(Debug)]
pub struct ClassDescriptorBuilder {
    name: String,
    storage_name: Option<String>,
    identifier: Vec<String>,
    fields: Vec<FieldDescriptor>,
    transient: Vec<String>,
    parent: Option<String>,
}

impl ClassDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            storage_name: None,
            identifier: Vec::new(),
            fields: Vec::new(),
            transient: Vec::new(),
            parent: None,
        }
    }

    /// Declare an identifier field. Order of calls is the identifier order.
    pub fn id(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.identifier.push(field.clone());
        self.fields.push(FieldDescriptor {
            name: field,
            id: true,
        });
        self
    }

    /// Declare a mapped value field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: field.into(),
            id: false,
        });
        self
    }

    /// Declare several mapped value fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            self = self.field(field);
        }
        self
    }

    /// Declare a field that is never persisted.
    pub fn transient(mut self, field: impl Into<String>) -> Self {
        self.transient.push(field.into());
        self
    }

    /// Override the default storage container name.
    pub fn storage_name(mut self, name: impl Into<String>) -> Self {
        self.storage_name = Some(name.into());
        self
    }

    /// Mark this class as a subclass sharing its parent's container.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn build(self) -> MappingResult<ClassDescriptor> {
        if self.identifier.is_empty() {
            return Err(MappingError::MissingIdentifier { class: self.name });
        }

        let mut fields = BTreeMap::new();
        for field in self.fields {
            if fields.contains_key(&field.name) {
                return Err(MappingError::DuplicateField {
                    class: self.name,
                    field: field.name,
                });
            }
            fields.insert(field.name.clone(), field);
        }

        let mut transient = BTreeSet::new();
        for field in self.transient {
            if fields.get(&field).is_some_and(|f| f.id) {
                return Err(MappingError::TransientIdentifier {
                    class: self.name,
                    field,
                });
            }
            // A transient declaration wins over a mapped one.
            fields.remove(&field);
            transient.insert(field);
        }

        let storage_explicit = self.storage_name.is_some();
        let storage_name = self
            .storage_name
            .unwrap_or_else(|| default_storage_name(&self.name));
        let composite = self.identifier.len() > 1;

        Ok(ClassDescriptor {
            name: self.name,
            storage_name,
            identifier: self.identifier,
            composite,
            fields,
            transient,
            parent: self.parent,
            storage_explicit,
        })
    }
}

/// Lower-cased simple name: `blog::model::Post` becomes `post`.
pub fn default_storage_name(class: &str) -> String {
    class.rsplit("::").next().unwrap_or(class).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> ClassDescriptor {
        ClassDescriptor::builder("blog::Post")
            .id("id")
            .fields(["headline", "body"])
            .transient("cached_html")
            .build()
            .unwrap()
    }

    #[test]
    fn storage_name_defaults_to_simple_name() {
        assert_eq!(post().storage_name(), "post");
        assert_eq!(default_storage_name("Comment"), "comment");
    }

    #[test]
    fn storage_name_override() {
        let d = ClassDescriptor::builder("Post")
            .id("id")
            .storage_name("posts_v2")
            .build()
            .unwrap();
        assert_eq!(d.storage_name(), "posts_v2");
        assert!(d.has_explicit_storage_name());
        assert!(!post().has_explicit_storage_name());
    }

    #[test]
    fn identifier_is_required() {
        let err = ClassDescriptor::builder("NoId")
            .field("name")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            MappingError::MissingIdentifier {
                class: "NoId".into()
            }
        );
    }

    #[test]
    fn composite_follows_identifier_count() {
        assert!(!post().is_composite());
        let d = ClassDescriptor::builder("Reading")
            .id("dist")
            .id("range")
            .field("value")
            .build()
            .unwrap();
        assert!(d.is_composite());
        assert_eq!(d.identifier(), ["dist".to_string(), "range".to_string()]);
        assert_eq!(d.single_identifier(), "dist");
    }

    #[test]
    fn value_fields_exclude_identifiers_and_transients() {
        let d = post();
        let values: Vec<&str> = d.value_fields().collect();
        assert_eq!(values, vec!["body", "headline"]);
        assert!(d.is_identifier("id"));
        assert!(!d.is_identifier("headline"));
        assert!(d.is_transient("cached_html"));
        assert!(!d.has_field("cached_html"));
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = ClassDescriptor::builder("Post")
            .id("id")
            .field("id")
            .build()
            .unwrap_err();
        assert!(matches!(err, MappingError::DuplicateField { .. }));
    }

    #[test]
    fn transient_identifier_rejected() {
        let err = ClassDescriptor::builder("Post")
            .id("id")
            .transient("id")
            .build()
            .unwrap_err();
        assert!(matches!(err, MappingError::TransientIdentifier { .. }));
    }
}

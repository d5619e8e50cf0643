//! Sample mapped types shared by tests across the workspace.

use kvo_types::{Record, Value};
use serde_json::json;

use crate::descriptor::ClassDescriptor;
use crate::entity::{decode_field, unknown_field, Entity, Mapped};
use crate::error::MappingResult;

/// Single-key root class.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Post {
    pub id: String,
    pub headline: String,
    pub extra: Record,
}

impl Post {
    pub fn new(id: &str, headline: &str) -> Self {
        Self {
            id: id.to_string(),
            headline: headline.to_string(),
            ..Self::default()
        }
    }
}

impl Entity for Post {
    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(json!(self.id)),
            "headline" => Some(json!(self.headline)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> MappingResult<()> {
        match name {
            "id" => self.id = decode_field(Self::CLASS, name, value)?,
            "headline" => self.headline = decode_field(Self::CLASS, name, value)?,
            _ => return Err(unknown_field(Self::CLASS, name)),
        }
        Ok(())
    }

    fn additional_fields(&self) -> Option<&Record> {
        Some(&self.extra)
    }

    fn additional_fields_mut(&mut self) -> Option<&mut Record> {
        Some(&mut self.extra)
    }
}

impl Mapped for Post {
    const CLASS: &'static str = "Post";

    fn descriptor() -> MappingResult<ClassDescriptor> {
        ClassDescriptor::builder(Self::CLASS)
            .id("id")
            .field("headline")
            .build()
    }

    fn instantiate() -> Self {
        Self::default()
    }
}

/// Subclass of [`Post`] stored in the same container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Article {
    pub id: String,
    pub headline: String,
    pub body: Option<String>,
    pub author: String,
}

impl Entity for Article {
    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(json!(self.id)),
            "headline" => Some(json!(self.headline)),
            "body" => Some(json!(self.body)),
            "author" => Some(json!(self.author)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> MappingResult<()> {
        match name {
            "id" => self.id = decode_field(Self::CLASS, name, value)?,
            "headline" => self.headline = decode_field(Self::CLASS, name, value)?,
            "body" => self.body = decode_field(Self::CLASS, name, value)?,
            "author" => self.author = decode_field(Self::CLASS, name, value)?,
            _ => return Err(unknown_field(Self::CLASS, name)),
        }
        Ok(())
    }
}

impl Mapped for Article {
    const CLASS: &'static str = "Article";

    fn descriptor() -> MappingResult<ClassDescriptor> {
        ClassDescriptor::builder(Self::CLASS)
            .id("id")
            .fields(["headline", "body", "author"])
            .extends(Post::CLASS)
            .build()
    }

    fn instantiate() -> Self {
        Self::default()
    }
}

/// Root class with a numeric key and a transient field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub rendered: Option<String>,
}

impl Entity for Comment {
    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(json!(self.id)),
            "text" => Some(json!(self.text)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> MappingResult<()> {
        match name {
            "id" => self.id = decode_field(Self::CLASS, name, value)?,
            "text" => self.text = decode_field(Self::CLASS, name, value)?,
            _ => return Err(unknown_field(Self::CLASS, name)),
        }
        Ok(())
    }
}

impl Mapped for Comment {
    const CLASS: &'static str = "Comment";

    fn descriptor() -> MappingResult<ClassDescriptor> {
        ClassDescriptor::builder(Self::CLASS)
            .id("id")
            .field("text")
            .transient("rendered")
            .build()
    }

    fn instantiate() -> Self {
        Self::default()
    }
}

/// Composite-key class (`dist`, `range`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reading {
    pub dist: String,
    pub range: i64,
    pub celsius: i64,
}

impl Reading {
    pub fn new(dist: &str, range: i64, celsius: i64) -> Self {
        Self {
            dist: dist.to_string(),
            range,
            celsius,
        }
    }
}

impl Entity for Reading {
    fn class_name(&self) -> &str {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "dist" => Some(json!(self.dist)),
            "range" => Some(json!(self.range)),
            "celsius" => Some(json!(self.celsius)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> MappingResult<()> {
        match name {
            "dist" => self.dist = decode_field(Self::CLASS, name, value)?,
            "range" => self.range = decode_field(Self::CLASS, name, value)?,
            "celsius" => self.celsius = decode_field(Self::CLASS, name, value)?,
            _ => return Err(unknown_field(Self::CLASS, name)),
        }
        Ok(())
    }
}

impl Mapped for Reading {
    const CLASS: &'static str = "Reading";

    fn descriptor() -> MappingResult<ClassDescriptor> {
        ClassDescriptor::builder(Self::CLASS)
            .id("dist")
            .id("range")
            .field("celsius")
            .build()
    }

    fn instantiate() -> Self {
        Self::default()
    }
}

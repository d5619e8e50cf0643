//! Traced persist, update, remove cycle over an in-memory backend.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use kvo_mapping::{decode_field, unknown_field, ClassDescriptor, Entity, Mapped, MappingResult};
use kvo_sdk::{
    Capabilities, CommitSummary, EntityManager, InMemoryBackend, ManagerConfig, StorageBackend, Value,
};
use kvo_store::{RecordingBackend, StorageCall};
use serde::Serialize;
use serde_json::json;

use crate::cli::{BackendArgs, DemoArgs};

#[derive(Debug, Default)]
pub struct Post {
    pub id: String,
    pub headline: String,
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

pub fn capabilities(args: &BackendArgs) -> Capabilities {
    Capabilities {
        partial_updates: args.partial_updates,
        composite_primary_keys: !args.no_composite_keys,
        requires_composite_primary_keys: args.require_composite_keys,
    }
}

#[derive(Debug, Serialize)]
pub struct DemoStep {
    pub step: &'static str,
    pub summary: CommitSummary,
    pub calls: Vec<StorageCall>,
}

#[derive(Debug, Serialize)]
pub struct DemoReport {
    pub backend: String,
    pub capabilities: Capabilities,
    pub steps: Vec<DemoStep>,
}

pub fn run(args: &DemoArgs, config: ManagerConfig) -> anyhow::Result<DemoReport> {
    let capabilities = capabilities(&args.backend);
    let store = Arc::new(RecordingBackend::new(InMemoryBackend::with_capabilities(
        capabilities,
    )));
    let mut em = EntityManager::builder()
        .backend(store.clone())
        .config(config)
        .register::<Post>()
        .build()?;

    let mut steps = Vec::new();
    let post = Rc::new(RefCell::new(Post {
        id: args.id.clone(),
        headline: args.headline.clone(),
    }));

    em.persist(&post)?;
    let summary = em.flush()?;
    steps.push(DemoStep {
        step: "persist",
        summary,
        calls: store.take_calls(),
    });

    post.borrow_mut().headline = args.new_headline.clone();
    let summary = em.flush()?;
    steps.push(DemoStep {
        step: "update",
        summary,
        calls: store.take_calls(),
    });

    em.remove(&post)?;
    let summary = em.flush()?;
    steps.push(DemoStep {
        step: "remove",
        summary,
        calls: store.take_calls(),
    });

    Ok(DemoReport {
        backend: store.name().to_string(),
        capabilities,
        steps,
    })
}

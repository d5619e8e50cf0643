//! Change tracking for kvo.
//!
//! This crate holds the [`UnitOfWork`], which keeps the identity map and the
//! per-object snapshots, and turns object lifecycle events into the minimal
//! sequence of storage calls at commit time. The identifier strategies
//! ([`SingleIdHandler`], [`CompositeIdHandler`]) decide how keys are
//! normalized and hashed for the identity map.

pub mod error;
pub mod handler;
pub mod unit_of_work;

pub use error::{UnitError, UnitResult};
pub use handler::{handler_for, CompositeIdHandler, IdHandler, SingleIdHandler};
pub use unit_of_work::{CommitFailurePolicy, CommitSummary, UnitOfWork};

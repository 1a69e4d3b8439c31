//! # Sluice Core
//!
//! Deferred entity submission for a group-partitioned ECS database:
//! - Structural changes are queued during a cycle, never applied mid-iteration
//! - Additions are double-buffered, so engines can stage while being notified
//! - One pass applies everything in order and notifies engines afterwards
//!
//! ## Architecture Rules
//!
//! 1. **Deferred mutation** - Producers record, the submission pass applies
//! 2. **Merge before notify** - Engines see a complete database for the pass
//! 3. **Faults are loud** - Every failed operation is logged with its origin
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_core::{Egid, EnginesRoot, GroupId, SubmissionConfig};
//!
//! let mut root = EnginesRoot::new(SubmissionConfig::default());
//! let submitter = root.submitter();
//!
//! submitter.build_entity(Egid::from_raw(0, 0)).with(Health(100)).finish()?;
//! root.submit_entities()?;
//!
//! submitter.swap_entity_group(Egid::from_raw(0, 0), GroupId::new(1));
//! root.submit_entities()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod engine;
pub mod error;
pub mod submission;
pub mod sync;

pub use config::{FaultPolicy, SubmissionConfig, SwapIdPolicy};
pub use ecs::{
    Component, ComponentStore, ComponentType, Egid, EntityId, GroupEntityDb, GroupId,
    SharedStore, StoreRef, TypeSafeStore,
};
pub use engine::{EngineRegistry, Reactor, ReactorContext};
pub use error::{SubmissionError, SubmissionResult};
pub use submission::{
    EnginesRoot, EntityDescriptor, EntityInitializer, EntitySubmitter, Operation,
    OperationReport, QueuedOperation, StagedGroups, SubmissionStats,
};
pub use sync::DoubleBuffered;

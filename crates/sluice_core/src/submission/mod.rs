//! # Deferred Submission
//!
//! Structural changes are recorded during a cycle and applied in one pass
//! at a synchronization point:
//!
//! - [`EntitySubmitter`]: producer handle, stages additions and enqueues operations
//! - [`EnginesRoot`]: owns the database and engines, runs the pass
//! - [`Operation`]: Swap, Remove, RemoveGroup
//! - [`StagedGroups`]: one slot of staged additions

mod operation;
mod root;
mod staging;
mod submitter;

pub use operation::{EntityDescriptor, Operation, OperationReport, QueuedOperation};
pub use root::{EnginesRoot, SubmissionStats};
pub use staging::StagedGroups;
pub use submitter::{EntityInitializer, EntitySubmitter};

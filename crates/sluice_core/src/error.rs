//! # Submission Error Types
//!
//! All errors that can occur while staging entities or running a submission
//! pass.

use thiserror::Error;

use crate::ecs::{ComponentType, Egid, GroupId};
use crate::submission::OperationReport;

/// Errors that can occur in the submission core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// An operation referenced an entity that is not in the database.
    #[error("entity {egid} has no {component} component")]
    EntityNotFound {
        /// The entity that was looked up.
        egid: Egid,
        /// The component type that was missing.
        component: ComponentType,
    },

    /// An operation referenced an entity that has no component in its group.
    #[error("entity {0} is not in the database")]
    UnknownEntity(Egid),

    /// An operation referenced a group that is not in the database.
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    /// The same entity was staged or merged twice for one component type.
    #[error("entity {egid} already has a {component} component")]
    DuplicateEntity {
        /// The colliding entity.
        egid: Egid,
        /// The component type the collision happened on.
        component: ComponentType,
    },

    /// A swap targeted an id that is already taken in the destination group.
    #[error("swap destination {egid} is already occupied")]
    DestinationOccupied {
        /// The occupied destination.
        egid: Egid,
    },

    /// A store was handed data of another component type.
    #[error("component type mismatch: expected {expected}, found {found}")]
    ComponentTypeMismatch {
        /// The type the store holds.
        expected: ComponentType,
        /// The type it was given.
        found: ComponentType,
    },

    /// The group index and the type index disagree about a store.
    #[error("index mismatch for {component} in group {group}")]
    InconsistentIndex {
        /// Group of the mismatched slot.
        group: GroupId,
        /// Component type of the mismatched slot.
        component: ComponentType,
    },

    /// A group ran out of entity ids while allocating a swap destination.
    #[error("group {0} has no free entity ids left")]
    IdsExhausted(GroupId),

    /// A structural operation failed; carries the full operation context.
    #[error("{report}: {source}")]
    Operation {
        /// What was being applied.
        report: OperationReport,
        /// Why it failed.
        source: Box<SubmissionError>,
    },

    /// Merging staged entities into the database failed.
    #[error("entity flush aborted: {source}")]
    Flush {
        /// Why the merge failed.
        source: Box<SubmissionError>,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for submission operations.
pub type SubmissionResult<T> = Result<T, SubmissionError>;

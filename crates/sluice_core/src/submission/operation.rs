//! # Structural Operations
//!
//! Deferred structural changes to the database.
//!
//! Producers never touch the database directly: they record an
//! [`Operation`] and the submission pass applies it at the next
//! synchronization point, strictly in the order it was recorded.
//!
//! Every queued operation remembers where it was enqueued, so a fault
//! raised passes later still points at the call that caused it.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::ecs::{Component, ComponentType, Egid, EntityId, GroupId};

/// A deferred structural change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Moves an entity into another group.
    Swap {
        /// The entity as it is now.
        from: Egid,
        /// Destination group.
        to_group: GroupId,
    },

    /// Deletes an entity.
    Remove {
        /// The entity to delete.
        egid: Egid,
    },

    /// Deletes a group and every entity in it.
    RemoveGroup {
        /// The group to delete.
        group: GroupId,
    },
}

impl Operation {
    /// Short name of the operation kind, as used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Swap { .. } => "swap",
            Self::Remove { .. } => "remove",
            Self::RemoveGroup { .. } => "remove_group",
        }
    }
}

/// The component types an operation applies to.
///
/// An empty descriptor means "every type the entity has".
///
/// ```rust,ignore
/// let descriptor = EntityDescriptor::new().with::<Health>().with::<Speed>();
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    types: Arc<[ComponentType]>,
}

impl Default for EntityDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityDescriptor {
    /// Empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: Arc::from(Vec::new()),
        }
    }

    /// Adds component type `C`. Adding a type twice has no effect.
    #[must_use]
    pub fn with<C: Component>(self) -> Self {
        let component = ComponentType::of::<C>();
        if self.types.contains(&component) {
            return self;
        }
        let mut types = self.types.to_vec();
        types.push(component);
        Self {
            types: types.into(),
        }
    }

    /// The described types.
    #[inline]
    #[must_use]
    pub fn types(&self) -> &[ComponentType] {
        &self.types
    }

    /// Whether this descriptor means "every type the entity has".
    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.types.is_empty()
    }
}

/// An operation waiting in the queue.
#[derive(Clone, Debug)]
pub struct QueuedOperation {
    /// What to do.
    pub operation: Operation,
    /// Which component types it touches.
    pub descriptor: EntityDescriptor,
    /// Where it was enqueued.
    pub origin: &'static Location<'static>,
}

impl QueuedOperation {
    pub(crate) fn new(
        operation: Operation,
        descriptor: EntityDescriptor,
        origin: &'static Location<'static>,
    ) -> Self {
        Self {
            operation,
            descriptor,
            origin,
        }
    }

    /// Diagnostic summary of this operation.
    #[must_use]
    pub fn report(&self) -> OperationReport {
        let (entity, from_group, to_group) = match self.operation {
            Operation::Swap { from, to_group } => (Some(from.entity), from.group, Some(to_group)),
            Operation::Remove { egid } => (Some(egid.entity), egid.group, None),
            Operation::RemoveGroup { group } => (None, group, None),
        };
        OperationReport {
            kind: self.operation.kind(),
            entity,
            from_group,
            to_group,
            origin: self.origin,
        }
    }
}

/// Full context of a failed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationReport {
    /// Operation kind (`swap`, `remove`, `remove_group`).
    pub kind: &'static str,
    /// Entity id, absent for group operations.
    pub entity: Option<EntityId>,
    /// Source group.
    pub from_group: GroupId,
    /// Destination group, swaps only.
    pub to_group: Option<GroupId>,
    /// Where the operation was enqueued.
    pub origin: &'static Location<'static>,
}

impl fmt::Display for OperationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(entity) = self.entity {
            write!(f, " entity {entity}")?;
        }
        write!(f, " from group {}", self.from_group)?;
        if let Some(to_group) = self.to_group {
            write!(f, " to group {to_group}")?;
        }
        write!(f, " (enqueued at {})", self.origin)
    }
}

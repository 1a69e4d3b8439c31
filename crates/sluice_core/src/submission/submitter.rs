//! # Entity Submitter
//!
//! The producer side of submission. Any number of cloned handles can stage
//! entities and enqueue structural operations; nothing they record is
//! visible in the database before the next submission pass.
//!
//! ```rust,ignore
//! let submitter = root.submitter();
//! submitter
//!     .build_entity(Egid::from_raw(1, 0))
//!     .with(Health(100))
//!     .with(Speed(2.0))
//!     .finish()?;
//! submitter.swap_entity_group(Egid::from_raw(7, 0), GroupId::new(1));
//! ```

use std::panic::Location;
use std::sync::Arc;

use parking_lot::Mutex;

use super::operation::{EntityDescriptor, Operation, QueuedOperation};
use super::staging::StagedGroups;
use crate::config::SubmissionConfig;
use crate::ecs::{Component, ComponentType, Egid, EntityId, GroupId};
use crate::error::{SubmissionError, SubmissionResult};
use crate::sync::DoubleBuffered;

/// Everything recorded since the last pass.
struct PendingState {
    operations: Vec<QueuedOperation>,
    additions: DoubleBuffered<StagedGroups>,
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct EntitySubmitter {
    state: Arc<Mutex<PendingState>>,
}

impl EntitySubmitter {
    /// Creates a submitter with empty queues.
    #[must_use]
    pub fn new(config: &SubmissionConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(PendingState {
                operations: Vec::with_capacity(config.operation_capacity),
                additions: DoubleBuffered::new(),
            })),
        }
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// Starts staging a new entity.
    ///
    /// Nothing is staged until [`EntityInitializer::finish`].
    pub fn build_entity(&self, egid: Egid) -> EntityInitializer<'_> {
        EntityInitializer {
            submitter: self,
            egid,
            components: Vec::new(),
        }
    }

    /// Stages a single component for `egid`.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::DuplicateEntity`] if `egid` already has a staged `C`.
    pub fn add_component<C: Component>(&self, egid: Egid, component: C) -> SubmissionResult<()> {
        self.state.lock().additions.current_mut().stage(egid, component)
    }

    fn stage_all(&self, egid: Egid, components: Vec<Box<dyn StageComponent>>) -> SubmissionResult<()> {
        let mut state = self.state.lock();
        let current = state.additions.current_mut();

        for (i, component) in components.iter().enumerate() {
            let ty = component.component_type();
            let repeated = components[..i].iter().any(|c| c.component_type() == ty);
            if repeated || current.contains(egid, ty) {
                return Err(SubmissionError::DuplicateEntity { egid, component: ty });
            }
        }
        for component in components {
            component.stage_into(current, egid)?;
        }
        Ok(())
    }

    // =========================================================================
    // Structural operations
    // =========================================================================

    /// Moves every component of `from` into `to_group` on the next pass.
    #[track_caller]
    pub fn swap_entity_group(&self, from: Egid, to_group: GroupId) {
        self.swap_entity_group_with(from, to_group, EntityDescriptor::new());
    }

    /// Moves the components of `from` listed in `descriptor` into
    /// `to_group` on the next pass.
    #[track_caller]
    pub fn swap_entity_group_with(&self, from: Egid, to_group: GroupId, descriptor: EntityDescriptor) {
        self.enqueue(Operation::Swap { from, to_group }, descriptor, Location::caller());
    }

    /// Deletes every component of `egid` on the next pass.
    #[track_caller]
    pub fn remove_entity(&self, egid: Egid) {
        self.remove_entity_with(egid, EntityDescriptor::new());
    }

    /// Deletes the components of `egid` listed in `descriptor` on the next pass.
    #[track_caller]
    pub fn remove_entity_with(&self, egid: Egid, descriptor: EntityDescriptor) {
        self.enqueue(Operation::Remove { egid }, descriptor, Location::caller());
    }

    /// Deletes `group` and everything in it on the next pass.
    #[track_caller]
    pub fn remove_group(&self, group: GroupId) {
        self.enqueue(
            Operation::RemoveGroup { group },
            EntityDescriptor::new(),
            Location::caller(),
        );
    }

    fn enqueue(
        &self,
        operation: Operation,
        descriptor: EntityDescriptor,
        origin: &'static Location<'static>,
    ) {
        self.state
            .lock()
            .operations
            .push(QueuedOperation::new(operation, descriptor, origin));
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Number of queued structural operations.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.state.lock().operations.len()
    }

    /// Number of components staged for the next pass.
    #[must_use]
    pub fn staged_count(&self) -> usize {
        self.state.lock().additions.current().len()
    }

    /// Whether the next pass has anything to do.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        let state = self.state.lock();
        !state.operations.is_empty() || !state.additions.current().is_empty()
    }

    // =========================================================================
    // Driver side
    // =========================================================================

    /// Moves every queued operation into `into`, leaving the queue empty.
    pub(crate) fn take_operations(&self, into: &mut Vec<QueuedOperation>) {
        into.append(&mut self.state.lock().operations);
    }

    /// Highest entity id staged for `group` in the slot that will be
    /// flushed next.
    pub(crate) fn highest_staged_id(&self, group: GroupId) -> Option<EntityId> {
        self.state.lock().additions.current().highest_id(group)
    }

    /// Swaps the staging slots and moves the filled one out.
    ///
    /// Returns `None` without swapping when nothing is staged.
    pub(crate) fn swap_additions(&self) -> Option<StagedGroups> {
        let mut state = self.state.lock();
        if state.additions.current().is_empty() {
            return None;
        }
        state.additions.swap();
        Some(state.additions.take_other())
    }

    /// Hands a flushed slot back, cleared, for reuse on a later swap.
    pub(crate) fn return_additions(&self, mut staged: StagedGroups) {
        staged.clear();
        self.state.lock().additions.replace_other(staged);
    }
}

/// Staging of one entity with several components.
///
/// All components are staged together on [`finish`](Self::finish), or none
/// are.
#[must_use = "nothing is staged until `finish` is called"]
pub struct EntityInitializer<'a> {
    submitter: &'a EntitySubmitter,
    egid: Egid,
    components: Vec<Box<dyn StageComponent>>,
}

impl EntityInitializer<'_> {
    /// Adds a component.
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.components.push(Box::new(component));
        self
    }

    /// Stages the entity.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::DuplicateEntity`] if a component type was given
    /// twice or is already staged for this entity. Nothing is staged then.
    pub fn finish(self) -> SubmissionResult<Egid> {
        self.submitter.stage_all(self.egid, self.components)?;
        Ok(self.egid)
    }
}

/// A component value waiting to be staged.
trait StageComponent: Send {
    fn component_type(&self) -> ComponentType;
    fn stage_into(self: Box<Self>, staged: &mut StagedGroups, egid: Egid) -> SubmissionResult<()>;
}

impl<C: Component> StageComponent for C {
    fn component_type(&self) -> ComponentType {
        ComponentType::of::<C>()
    }

    fn stage_into(self: Box<Self>, staged: &mut StagedGroups, egid: Egid) -> SubmissionResult<()> {
        staged.stage(egid, *self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Speed(u32);
    impl Component for Speed {}

    fn submitter() -> EntitySubmitter {
        EntitySubmitter::new(&SubmissionConfig::default())
    }

    #[test]
    fn test_build_entity_stages_all() {
        let submitter = submitter();
        let egid = submitter
            .build_entity(Egid::from_raw(1, 0))
            .with(Health(1))
            .with(Speed(2))
            .finish()
            .unwrap();

        assert_eq!(egid, Egid::from_raw(1, 0));
        assert_eq!(submitter.staged_count(), 2);
        assert!(submitter.has_pending());
    }

    #[test]
    fn test_build_entity_is_all_or_nothing() {
        let submitter = submitter();
        submitter.add_component(Egid::from_raw(1, 0), Speed(0)).unwrap();

        let err = submitter
            .build_entity(Egid::from_raw(1, 0))
            .with(Health(1))
            .with(Speed(2))
            .finish()
            .unwrap_err();
        assert!(matches!(err, SubmissionError::DuplicateEntity { .. }));
        assert_eq!(submitter.staged_count(), 1);

        let err = submitter
            .build_entity(Egid::from_raw(2, 0))
            .with(Health(1))
            .with(Health(2))
            .finish()
            .unwrap_err();
        assert!(matches!(err, SubmissionError::DuplicateEntity { .. }));
        assert_eq!(submitter.staged_count(), 1);
    }

    #[test]
    fn test_operations_keep_order_and_origin() {
        let submitter = submitter();
        submitter.remove_entity(Egid::from_raw(1, 0));
        submitter.swap_entity_group(Egid::from_raw(2, 0), GroupId::new(1));
        submitter.remove_group(GroupId::new(3));
        assert_eq!(submitter.pending_operations(), 3);

        let mut taken = Vec::new();
        submitter.take_operations(&mut taken);
        assert_eq!(submitter.pending_operations(), 0);

        let kinds: Vec<_> = taken.iter().map(|q| q.operation.kind()).collect();
        assert_eq!(kinds, vec!["remove", "swap", "remove_group"]);
        assert!(taken[0].origin.file().ends_with("submitter.rs"));
    }

    #[test]
    fn test_swap_additions_isolates_slots() {
        let submitter = submitter();
        assert!(submitter.swap_additions().is_none());

        submitter.add_component(Egid::from_raw(1, 0), Health(1)).unwrap();
        let staged = submitter.swap_additions().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(submitter.staged_count(), 0);

        // Staging during the flush lands in the new current slot.
        submitter.add_component(Egid::from_raw(1, 0), Health(2)).unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(submitter.staged_count(), 1);

        submitter.return_additions(staged);
        assert_eq!(submitter.staged_count(), 1);
    }

    #[test]
    fn test_highest_staged_id_tracks_current_slot() {
        let submitter = submitter();
        assert!(submitter.highest_staged_id(GroupId::new(2)).is_none());

        submitter.add_component(Egid::from_raw(6, 2), Health(6)).unwrap();
        submitter.add_component(Egid::from_raw(3, 2), Speed(3)).unwrap();
        assert_eq!(submitter.highest_staged_id(GroupId::new(2)), Some(EntityId::new(6)));

        let staged = submitter.swap_additions().unwrap();
        assert!(submitter.highest_staged_id(GroupId::new(2)).is_none());
        submitter.return_additions(staged);
    }

    #[test]
    fn test_clones_share_queues() {
        let a = submitter();
        let b = a.clone();
        b.remove_group(GroupId::new(0));
        assert_eq!(a.pending_operations(), 1);
    }
}

//! # Addition Staging
//!
//! Entities waiting to be merged into the database, indexed
//! group → component type → store.
//!
//! One [`StagedGroups`] is one slot of the submitter's double buffer.
//! Clearing a slot empties the stores of the groups staged into since the
//! previous clear and keeps them, with their allocations, for the next
//! cycle. Groups left untouched for a whole cycle are dropped.

use std::collections::{HashMap, HashSet};

use crate::ecs::{
    Component, ComponentStore, ComponentType, Egid, EntityId, GroupId, TypeSafeStore,
};
use crate::error::{SubmissionError, SubmissionResult};

/// Staged stores of one group.
type StagedStores = HashMap<ComponentType, Box<dyn TypeSafeStore>>;

/// One slot of staged additions.
#[derive(Default)]
pub struct StagedGroups {
    groups: HashMap<GroupId, StagedStores>,
    /// Groups staged into since the last clear.
    touched: HashSet<GroupId>,
}

impl StagedGroups {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages `component` for `egid`.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::DuplicateEntity`] if `egid` already has a staged
    /// `C` in this slot. The staged value is kept.
    pub fn stage<C: Component>(&mut self, egid: Egid, component: C) -> SubmissionResult<()> {
        let ty = ComponentType::of::<C>();
        self.touched.insert(egid.group);
        let store = self
            .groups
            .entry(egid.group)
            .or_default()
            .entry(ty)
            .or_insert_with(|| Box::new(ComponentStore::<C>::new()));

        let found = store.component_type();
        let store = store
            .as_any_mut()
            .downcast_mut::<ComponentStore<C>>()
            .ok_or(SubmissionError::ComponentTypeMismatch { expected: ty, found })?;

        store
            .insert(egid.entity, component)
            .map_err(|_| SubmissionError::DuplicateEntity { egid, component: ty })
    }

    /// Whether `egid` has a staged component of type `component`.
    #[must_use]
    pub fn contains(&self, egid: Egid, component: ComponentType) -> bool {
        self.groups
            .get(&egid.group)
            .and_then(|stores| stores.get(&component))
            .is_some_and(|store| store.contains(egid.entity))
    }

    /// Highest entity id staged for `group`, across all component types.
    #[must_use]
    pub fn highest_id(&self, group: GroupId) -> Option<EntityId> {
        self.groups
            .get(&group)?
            .values()
            .filter_map(|store| store.entity_ids().iter().copied().max())
            .max()
    }

    /// Total number of staged components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups
            .values()
            .flat_map(HashMap::values)
            .map(|store| store.len())
            .sum()
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups
            .values()
            .flat_map(HashMap::values)
            .all(|store| store.is_empty())
    }

    /// Number of groups with at least one staged component.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups
            .values()
            .filter(|stores| stores.values().any(|store| !store.is_empty()))
            .count()
    }

    /// Every non-empty staged store with its group.
    pub(crate) fn stores(&self) -> impl Iterator<Item = (GroupId, &dyn TypeSafeStore)> + '_ {
        self.groups.iter().flat_map(|(&group, stores)| {
            stores
                .values()
                .filter(|store| !store.is_empty())
                .map(move |store| (group, &**store))
        })
    }

    /// Every non-empty staged store with its group, mutably.
    pub(crate) fn stores_mut(
        &mut self,
    ) -> impl Iterator<Item = (GroupId, &mut Box<dyn TypeSafeStore>)> + '_ {
        self.groups.iter_mut().flat_map(|(&group, stores)| {
            stores
                .values_mut()
                .filter(|store| !store.is_empty())
                .map(move |store| (group, store))
        })
    }

    /// Empties every store. Stores of groups staged into since the last
    /// clear are kept for reuse; all other groups are dropped.
    pub fn clear(&mut self) {
        let touched = &self.touched;
        self.groups.retain(|group, _| touched.contains(group));
        for store in self.groups.values_mut().flat_map(HashMap::values_mut) {
            store.clear();
        }
        self.touched.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    #[test]
    fn test_stage_and_count() {
        let mut staged = StagedGroups::new();
        assert!(staged.is_empty());

        staged.stage(Egid::from_raw(1, 0), Health(1)).unwrap();
        staged.stage(Egid::from_raw(1, 0), Name("one")).unwrap();
        staged.stage(Egid::from_raw(2, 5), Health(2)).unwrap();

        assert_eq!(staged.len(), 3);
        assert_eq!(staged.group_count(), 2);
        assert!(staged.contains(Egid::from_raw(1, 0), ComponentType::of::<Name>()));
        assert!(!staged.contains(Egid::from_raw(2, 5), ComponentType::of::<Name>()));
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut staged = StagedGroups::new();
        staged.stage(Egid::from_raw(1, 0), Health(1)).unwrap();

        let err = staged.stage(Egid::from_raw(1, 0), Health(9)).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::DuplicateEntity {
                egid: Egid::from_raw(1, 0),
                component: ComponentType::of::<Health>(),
            }
        );
        assert_eq!(staged.len(), 1);

        // Same id, another group: fine.
        staged.stage(Egid::from_raw(1, 1), Health(9)).unwrap();
    }

    #[test]
    fn test_highest_id() {
        let mut staged = StagedGroups::new();
        assert!(staged.highest_id(GroupId::new(2)).is_none());

        staged.stage(Egid::from_raw(4, 2), Health(4)).unwrap();
        staged.stage(Egid::from_raw(9, 2), Name("nine")).unwrap();
        staged.stage(Egid::from_raw(30, 3), Health(30)).unwrap();
        assert_eq!(staged.highest_id(GroupId::new(2)), Some(EntityId::new(9)));
    }

    #[test]
    fn test_clear_drops_idle_groups() {
        let mut staged = StagedGroups::new();
        for group in 0..10 {
            staged.stage(Egid::from_raw(0, group), Health(group)).unwrap();
        }
        staged.clear();
        assert_eq!(staged.groups.len(), 10);

        // Next cycle only group 3 is used.
        staged.stage(Egid::from_raw(1, 3), Health(1)).unwrap();
        staged.clear();
        assert_eq!(staged.groups.len(), 1);
        assert!(staged.groups.contains_key(&GroupId::new(3)));

        staged.clear();
        assert!(staged.groups.is_empty());
    }

    #[test]
    fn test_clear_keeps_stores() {
        let mut staged = StagedGroups::new();
        staged.stage(Egid::from_raw(1, 0), Health(1)).unwrap();
        staged.clear();

        assert!(staged.is_empty());
        assert_eq!(staged.group_count(), 0);
        assert_eq!(staged.groups.len(), 1);
        assert_eq!(staged.stores_mut().count(), 0);
    }
}

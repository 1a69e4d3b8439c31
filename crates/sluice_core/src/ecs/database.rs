//! # Group Entity Database
//!
//! The authoritative store of submitted entities.
//!
//! ```text
//!   groups:           GroupId ──▶ ComponentType ──▶ SharedStore
//!   groups_per_type:  ComponentType ──▶ GroupId ──▶ SharedStore
//! ```
//!
//! Both indices hold clones of the same `Arc`, so a (group, type) slot has
//! exactly one store no matter which side it is reached from. The second
//! index makes "every `T` across all groups" a single lookup.
//!
//! Readers use the typed query API between submission passes. All mutation
//! is crate-private and driven by the submission pass.

use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, RwLockReadGuard};

use super::component::{Component, ComponentType};
use super::entity::{Egid, EntityId, GroupId};
use super::storage::{ComponentStore, SharedStore, TypeSafeStore};
use crate::config::SwapIdPolicy;
use crate::error::{SubmissionError, SubmissionResult};

/// Read guard over one typed store of one group.
pub type StoreRef<'a, C> = MappedRwLockReadGuard<'a, ComponentStore<C>>;

type GroupStores = HashMap<ComponentType, SharedStore>;

/// Group id → component type → store, plus the reverse type index.
#[derive(Default)]
pub struct GroupEntityDb {
    /// For each group, its stores indexed by component type.
    groups: HashMap<GroupId, GroupStores>,
    /// For each component type, the groups holding it.
    groups_per_type: HashMap<ComponentType, HashMap<GroupId, SharedStore>>,
    /// Per group, one above the highest entity id ever inserted.
    watermarks: HashMap<GroupId, u64>,
}

impl GroupEntityDb {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether `group` exists.
    #[inline]
    #[must_use]
    pub fn group_exists(&self, group: GroupId) -> bool {
        self.groups.contains_key(&group)
    }

    /// Number of groups.
    #[inline]
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// All group ids, sorted.
    #[must_use]
    pub fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<_> = self.groups.keys().copied().collect();
        groups.sort_unstable();
        groups
    }

    /// Component types present in `group`. Empty if the group does not exist.
    #[must_use]
    pub fn component_types(&self, group: GroupId) -> Vec<ComponentType> {
        self.groups
            .get(&group)
            .map(|stores| stores.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Typed read access to the `C` store of `group`.
    ///
    /// Returns `None` if the group or the store does not exist.
    #[must_use]
    pub fn query<C: Component>(&self, group: GroupId) -> Option<StoreRef<'_, C>> {
        let store = self.store(group, ComponentType::of::<C>())?;
        RwLockReadGuard::try_map(store.read_recursive(), |store| {
            store.as_any().downcast_ref::<ComponentStore<C>>()
        })
        .ok()
    }

    /// Copy of the `C` component of `egid`.
    #[must_use]
    pub fn get<C: Component + Clone>(&self, egid: Egid) -> Option<C> {
        self.query::<C>(egid.group)?.get(egid.entity).cloned()
    }

    /// Whether `egid` has a `C` component.
    #[must_use]
    pub fn contains<C: Component>(&self, egid: Egid) -> bool {
        self.store(egid.group, ComponentType::of::<C>())
            .is_some_and(|store| store.read_recursive().contains(egid.entity))
    }

    /// Number of `C` components in `group`.
    #[must_use]
    pub fn entity_count<C: Component>(&self, group: GroupId) -> usize {
        self.store(group, ComponentType::of::<C>())
            .map_or(0, |store| store.read_recursive().len())
    }

    /// Number of `C` components across every group.
    #[must_use]
    pub fn count_all<C: Component>(&self) -> usize {
        self.groups_per_type
            .get(&ComponentType::of::<C>())
            .map_or(0, |per_group| {
                per_group
                    .values()
                    .map(|store| store.read_recursive().len())
                    .sum()
            })
    }

    /// Groups holding a `C` store, sorted.
    #[must_use]
    pub fn groups_with<C: Component>(&self) -> Vec<GroupId> {
        let mut groups: Vec<_> = self
            .groups_per_type
            .get(&ComponentType::of::<C>())
            .map(|per_group| per_group.keys().copied().collect())
            .unwrap_or_default();
        groups.sort_unstable();
        groups
    }

    /// Visits every `C` component across all groups.
    pub fn for_each<C, F>(&self, mut visit: F)
    where
        C: Component,
        F: FnMut(Egid, &C),
    {
        for group in self.groups_with::<C>() {
            if let Some(store) = self.query::<C>(group) {
                for (entity, component) in store.iter() {
                    visit(Egid::new(entity, group), component);
                }
            }
        }
    }

    /// The store of a (group, type) slot, through the group index.
    #[inline]
    pub(crate) fn store(&self, group: GroupId, component: ComponentType) -> Option<&SharedStore> {
        self.groups.get(&group)?.get(&component)
    }

    /// The store of a (group, type) slot, through the type index.
    #[inline]
    pub(crate) fn type_store(&self, component: ComponentType, group: GroupId) -> Option<&SharedStore> {
        self.groups_per_type.get(&component)?.get(&group)
    }

    /// Verifies both indices reference the identical store for every slot.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::InconsistentIndex`] for the first slot that is
    /// missing from one index or points at a different store.
    pub fn check_consistency(&self) -> SubmissionResult<()> {
        for (&group, stores) in &self.groups {
            for (&component, store) in stores {
                let mirrored = self
                    .type_store(component, group)
                    .is_some_and(|other| Arc::ptr_eq(store, other));
                if !mirrored {
                    return Err(SubmissionError::InconsistentIndex { group, component });
                }
            }
        }
        for (&component, per_group) in &self.groups_per_type {
            for (&group, store) in per_group {
                let mirrored = self
                    .store(group, component)
                    .is_some_and(|other| Arc::ptr_eq(store, other));
                if !mirrored {
                    return Err(SubmissionError::InconsistentIndex { group, component });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Mutation (submission pass only)
    // =========================================================================

    /// Locates or creates the store for `prototype`'s type in `group`, and
    /// makes the type index point at that same store.
    pub(crate) fn store_or_insert(
        &mut self,
        group: GroupId,
        prototype: &dyn TypeSafeStore,
    ) -> SharedStore {
        let component = prototype.component_type();
        let store = Arc::clone(
            self.groups
                .entry(group)
                .or_default()
                .entry(component)
                .or_insert_with(|| prototype.create_empty_of_same_type()),
        );
        self.groups_per_type
            .entry(component)
            .or_default()
            .insert(group, Arc::clone(&store));
        store
    }

    /// Checks that `staging` can be merged into `group` without touching
    /// the database: the slot holds the same type and none of the staged
    /// ids is already present.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::ComponentTypeMismatch`] if the slot holds another type
    /// - [`SubmissionError::DuplicateEntity`] for the first colliding id
    pub(crate) fn validate_staging(
        &self,
        group: GroupId,
        staging: &dyn TypeSafeStore,
    ) -> SubmissionResult<()> {
        let component = staging.component_type();
        let Some(store) = self.store(group, component) else {
            return Ok(());
        };
        let store = store.read_recursive();
        if store.component_type() != component {
            return Err(SubmissionError::ComponentTypeMismatch {
                expected: store.component_type(),
                found: component,
            });
        }
        match staging.entity_ids().iter().find(|&&id| store.contains(id)) {
            Some(&entity) => Err(SubmissionError::DuplicateEntity {
                egid: Egid::new(entity, group),
                component,
            }),
            None => Ok(()),
        }
    }

    /// Merges one staged store into the `group` slot of its type, returning
    /// the dense slots the new entities occupy.
    pub(crate) fn fill_from_staging(
        &mut self,
        group: GroupId,
        staging: &mut dyn TypeSafeStore,
    ) -> SubmissionResult<Range<usize>> {
        let highest = staging.entity_ids().iter().copied().max();
        let store = self.store_or_insert(group, staging);
        let slots = store.write().bulk_fill_from(staging, group)?;
        if let Some(highest) = highest {
            self.raise_watermark(group, highest);
        }
        Ok(slots)
    }

    /// Removes `egid` from every type in `types` (or every type it has when
    /// `types` is empty), returning the removed components.
    pub(crate) fn remove_entity(
        &mut self,
        egid: Egid,
        types: &[ComponentType],
    ) -> SubmissionResult<Vec<(ComponentType, Box<dyn Any + Send>)>> {
        let types = self.resolve_types(egid, types)?;
        let mut removed = Vec::with_capacity(types.len());
        for component in types {
            let Some(store) = self.store(egid.group, component) else {
                continue;
            };
            if let Some(value) = store.write().remove_entity(egid.entity) {
                removed.push((component, value));
            }
        }
        Ok(removed)
    }

    /// Moves `from` into `to_group`, returning its new identity and the
    /// component types that moved.
    ///
    /// The destination id follows `policy`. Under
    /// [`SwapIdPolicy::Allocate`] the id is also above `reserved`, the
    /// highest id already staged for `to_group`. Everything is validated
    /// before the first component moves.
    pub(crate) fn swap_entity(
        &mut self,
        from: Egid,
        to_group: GroupId,
        types: &[ComponentType],
        policy: SwapIdPolicy,
        reserved: Option<EntityId>,
    ) -> SubmissionResult<(Egid, Vec<ComponentType>)> {
        let types = self.resolve_types(from, types)?;
        let to = match policy {
            SwapIdPolicy::Preserve => from.with_group(to_group),
            SwapIdPolicy::Allocate => {
                Egid::new(self.next_free_id(to_group, reserved)?, to_group)
            }
        };
        if to == from {
            return Ok((to, types));
        }

        for &component in &types {
            if let Some(store) = self.store(to.group, component) {
                if store.read().contains(to.entity) {
                    return Err(SubmissionError::DestinationOccupied { egid: to });
                }
            }
        }

        for &component in &types {
            let source = self
                .store(from.group, component)
                .cloned()
                .ok_or(SubmissionError::EntityNotFound {
                    egid: from,
                    component,
                })?;

            if from.group == to.group {
                source.write().rekey_entity(from, to)?;
                continue;
            }

            let target = self.store_or_insert(to.group, &*source.read());
            let mut source = source.write();
            let mut target = target.write();
            source.move_entity(from, &mut *target, to)?;
        }

        self.raise_watermark(to.group, to.entity);
        Ok((to, types))
    }

    /// Drops `group` from both indices, returning its stores.
    pub(crate) fn remove_group(&mut self, group: GroupId) -> SubmissionResult<GroupStores> {
        let stores = self
            .groups
            .remove(&group)
            .ok_or(SubmissionError::GroupNotFound(group))?;

        for component in stores.keys() {
            if let Some(per_group) = self.groups_per_type.get_mut(component) {
                per_group.remove(&group);
                if per_group.is_empty() {
                    self.groups_per_type.remove(component);
                }
            }
        }
        self.watermarks.remove(&group);

        Ok(stores)
    }

    /// Types an operation on `egid` applies to.
    ///
    /// An explicit list must be fully present; an empty list means every
    /// type the entity currently has.
    fn resolve_types(
        &self,
        egid: Egid,
        types: &[ComponentType],
    ) -> SubmissionResult<Vec<ComponentType>> {
        let stores = self
            .groups
            .get(&egid.group)
            .ok_or(SubmissionError::GroupNotFound(egid.group))?;

        if types.is_empty() {
            let found: Vec<_> = stores
                .iter()
                .filter(|(_, store)| store.read().contains(egid.entity))
                .map(|(&component, _)| component)
                .collect();
            if found.is_empty() {
                return Err(SubmissionError::UnknownEntity(egid));
            }
            return Ok(found);
        }

        for &component in types {
            let present = stores
                .get(&component)
                .is_some_and(|store| store.read().contains(egid.entity));
            if !present {
                return Err(SubmissionError::EntityNotFound { egid, component });
            }
        }
        Ok(types.to_vec())
    }

    fn next_free_id(
        &self,
        group: GroupId,
        reserved: Option<EntityId>,
    ) -> SubmissionResult<EntityId> {
        let mark = self.watermarks.get(&group).copied().unwrap_or(0);
        let next = reserved.map_or(mark, |id| mark.max(u64::from(id.raw()) + 1));
        u32::try_from(next)
            .map(EntityId::new)
            .map_err(|_| SubmissionError::IdsExhausted(group))
    }

    fn raise_watermark(&mut self, group: GroupId, entity: EntityId) {
        let mark = self.watermarks.entry(group).or_insert(0);
        *mark = (*mark).max(u64::from(entity.raw()) + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    #[derive(Debug, Clone, PartialEq)]
    struct Name(&'static str);
    impl Component for Name {}

    fn stage<C: Component>(items: &[(u32, C)]) -> ComponentStore<C>
    where
        C: Clone,
    {
        let mut store = ComponentStore::new();
        for (id, component) in items {
            assert!(store.insert(EntityId::new(*id), component.clone()).is_ok());
        }
        store
    }

    fn g(raw: u32) -> GroupId {
        GroupId::new(raw)
    }

    fn populated() -> GroupEntityDb {
        let mut db = GroupEntityDb::new();
        db.fill_from_staging(g(1), &mut stage(&[(0, Health(10)), (1, Health(11))]))
            .unwrap();
        db.fill_from_staging(g(1), &mut stage(&[(0, Name("a")), (1, Name("b"))]))
            .unwrap();
        db.fill_from_staging(g(2), &mut stage(&[(5, Health(50))]))
            .unwrap();
        db
    }

    #[test]
    fn test_fill_creates_both_indices() {
        let db = populated();
        assert_eq!(db.groups(), vec![g(1), g(2)]);
        assert_eq!(db.groups_with::<Health>(), vec![g(1), g(2)]);
        assert_eq!(db.groups_with::<Name>(), vec![g(1)]);

        let ty = ComponentType::of::<Health>();
        let a = db.store(g(1), ty).unwrap();
        let b = db.type_store(ty, g(1)).unwrap();
        assert!(Arc::ptr_eq(a, b));
        db.check_consistency().unwrap();
    }

    #[test]
    fn test_typed_queries() {
        let db = populated();
        assert_eq!(db.get::<Health>(Egid::from_raw(1, 1)), Some(Health(11)));
        assert_eq!(db.get::<Health>(Egid::from_raw(1, 2)), None);
        assert!(db.contains::<Name>(Egid::from_raw(0, 1)));
        assert_eq!(db.entity_count::<Health>(g(1)), 2);
        assert_eq!(db.count_all::<Health>(), 3);
        assert!(db.query::<Name>(g(2)).is_none());

        let mut seen = Vec::new();
        db.for_each::<Health, _>(|egid, health| seen.push((egid, health.0)));
        seen.sort();
        assert_eq!(
            seen,
            vec![
                (Egid::from_raw(0, 1), 10),
                (Egid::from_raw(1, 1), 11),
                (Egid::from_raw(5, 2), 50),
            ]
        );
    }

    #[test]
    fn test_fill_duplicate_is_error() {
        let mut db = populated();
        let err = db
            .fill_from_staging(g(2), &mut stage(&[(5, Health(0))]))
            .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::DuplicateEntity {
                egid: Egid::from_raw(5, 2),
                component: ComponentType::of::<Health>(),
            }
        );
        assert_eq!(db.get::<Health>(Egid::from_raw(5, 2)), Some(Health(50)));
    }

    #[test]
    fn test_remove_entity_all_types() {
        let mut db = populated();
        let removed = db.remove_entity(Egid::from_raw(0, 1), &[]).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!db.contains::<Health>(Egid::from_raw(0, 1)));
        assert!(!db.contains::<Name>(Egid::from_raw(0, 1)));
        assert!(db.contains::<Health>(Egid::from_raw(1, 1)));
        db.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_stale_entity() {
        let mut db = populated();
        db.remove_entity(Egid::from_raw(0, 1), &[]).unwrap();

        let err = db.remove_entity(Egid::from_raw(0, 1), &[]).unwrap_err();
        assert_eq!(err, SubmissionError::UnknownEntity(Egid::from_raw(0, 1)));

        let err = db.remove_entity(Egid::from_raw(0, 9), &[]).unwrap_err();
        assert_eq!(err, SubmissionError::GroupNotFound(g(9)));
    }

    #[test]
    fn test_remove_with_explicit_types_validates_first() {
        let mut db = populated();
        let types = [ComponentType::of::<Health>(), ComponentType::of::<Name>()];

        // Entity 5 of group 2 has no Name: nothing must be removed.
        let err = db.remove_entity(Egid::from_raw(5, 2), &types).unwrap_err();
        assert!(matches!(err, SubmissionError::EntityNotFound { .. }));
        assert!(db.contains::<Health>(Egid::from_raw(5, 2)));
    }

    #[test]
    fn test_swap_preserve() {
        let mut db = populated();
        let (to, moved) = db
            .swap_entity(Egid::from_raw(1, 1), g(3), &[], SwapIdPolicy::Preserve, None)
            .unwrap();
        assert_eq!(to, Egid::from_raw(1, 3));
        assert_eq!(moved.len(), 2);
        assert_eq!(db.get::<Health>(to), Some(Health(11)));
        assert_eq!(db.get::<Name>(to), Some(Name("b")));
        assert!(!db.contains::<Health>(Egid::from_raw(1, 1)));
        assert!(db.contains::<Health>(Egid::from_raw(0, 1)));
        db.check_consistency().unwrap();
    }

    #[test]
    fn test_swap_allocate_uses_fresh_id() {
        let mut db = populated();
        let (to, _) = db
            .swap_entity(Egid::from_raw(0, 1), g(2), &[], SwapIdPolicy::Allocate, None)
            .unwrap();
        assert_eq!(to, Egid::from_raw(6, 2));
        assert_eq!(db.get::<Health>(to), Some(Health(10)));
        assert_eq!(db.get::<Name>(to), Some(Name("a")));
        // The name store of group 2 was created on demand.
        assert_eq!(db.groups_with::<Name>(), vec![g(1), g(2)]);
        db.check_consistency().unwrap();
    }

    #[test]
    fn test_swap_into_occupied_slot() {
        let mut db = populated();
        db.fill_from_staging(g(2), &mut stage(&[(1, Health(99))]))
            .unwrap();

        let err = db
            .swap_entity(Egid::from_raw(1, 1), g(2), &[], SwapIdPolicy::Preserve, None)
            .unwrap_err();
        assert_eq!(err, SubmissionError::DestinationOccupied { egid: Egid::from_raw(1, 2) });
        // Source untouched, including the type that would not have collided.
        assert_eq!(db.get::<Name>(Egid::from_raw(1, 1)), Some(Name("b")));
        assert_eq!(db.get::<Health>(Egid::from_raw(1, 1)), Some(Health(11)));
    }

    #[test]
    fn test_swap_within_group_allocate() {
        let mut db = populated();
        let (to, _) = db
            .swap_entity(Egid::from_raw(0, 1), g(1), &[], SwapIdPolicy::Allocate, None)
            .unwrap();
        assert_eq!(to, Egid::from_raw(2, 1));
        assert_eq!(db.get::<Health>(to), Some(Health(10)));
        assert_eq!(db.entity_count::<Health>(g(1)), 2);
    }

    #[test]
    fn test_swap_allocate_skips_reserved_ids() {
        let mut db = populated();
        // Group 2 holds id 5; ids up to 8 are already staged for it.
        let (to, _) = db
            .swap_entity(
                Egid::from_raw(0, 1),
                g(2),
                &[],
                SwapIdPolicy::Allocate,
                Some(EntityId::new(8)),
            )
            .unwrap();
        assert_eq!(to, Egid::from_raw(9, 2));

        // A reservation below the watermark changes nothing.
        let (to, _) = db
            .swap_entity(
                Egid::from_raw(1, 1),
                g(2),
                &[],
                SwapIdPolicy::Allocate,
                Some(EntityId::new(3)),
            )
            .unwrap();
        assert_eq!(to, Egid::from_raw(10, 2));
    }

    #[test]
    fn test_validate_staging_leaves_database_untouched() {
        let db = populated();

        let clean = stage(&[(7, Health(7)), (8, Health(8))]);
        db.validate_staging(g(2), &clean).unwrap();
        // Unknown group: nothing to collide with.
        db.validate_staging(g(9), &clean).unwrap();

        let colliding = stage(&[(7, Health(7)), (5, Health(0))]);
        let err = db.validate_staging(g(2), &colliding).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::DuplicateEntity {
                egid: Egid::from_raw(5, 2),
                component: ComponentType::of::<Health>(),
            }
        );
        assert_eq!(db.entity_count::<Health>(g(2)), 1);
    }

    #[test]
    fn test_remove_group_purges_both_indices() {
        let mut db = populated();
        let stores = db.remove_group(g(1)).unwrap();
        assert_eq!(stores.len(), 2);

        assert!(!db.group_exists(g(1)));
        assert_eq!(db.groups_with::<Health>(), vec![g(2)]);
        assert!(db.groups_with::<Name>().is_empty());
        assert!(db.query::<Health>(g(1)).is_none());
        assert_eq!(db.entity_count::<Health>(g(1)), 0);
        assert!(db.component_types(g(1)).is_empty());
        db.check_consistency().unwrap();

        assert_eq!(db.remove_group(g(1)).err().unwrap(), SubmissionError::GroupNotFound(g(1)));
    }
}

//! # Component Storage
//!
//! Dense, per-type component storage keyed by entity id.
//!
//! The storage uses a dense array strategy:
//! - Components live in one contiguous `Vec`, iteration is cache-friendly
//! - A side index maps entity id to dense slot, access is O(1)
//! - Removal is a swap-remove, so iteration order is not stable across removals
//!
//! [`ComponentStore`] is the only implementation of [`TypeSafeStore`]; the
//! trait is what the database and the submission driver see, so they never
//! need to know the concrete component type.

use std::any::Any;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;

use super::component::{Component, ComponentType};
use super::entity::{Egid, EntityId, GroupId};
use crate::engine::{EngineRegistry, ReactorContext};
use crate::error::{SubmissionError, SubmissionResult};

/// A store shared between the group index and the type index of the database.
pub type SharedStore = Arc<RwLock<dyn TypeSafeStore>>;

/// Type-erased capabilities of a component store.
///
/// Implemented once, generically, by [`ComponentStore`].
pub trait TypeSafeStore: Any + Send + Sync {
    /// Component type held by this store.
    fn component_type(&self) -> ComponentType;

    /// Number of entities held.
    fn len(&self) -> usize;

    /// Whether the store holds no entities.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `entity` has a component in this store.
    fn contains(&self, entity: EntityId) -> bool;

    /// Ids of all held entities, in iteration order.
    fn entity_ids(&self) -> &[EntityId];

    /// Creates a new, empty, shareable store of the same component type.
    fn create_empty_of_same_type(&self) -> SharedStore;

    /// Moves every entity of `staging` into this store, leaving `staging`
    /// empty with its allocation kept. Returns the dense slots the entities
    /// now occupy.
    ///
    /// Nothing is moved if any staged id is already present.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::ComponentTypeMismatch`] if `staging` holds another type
    /// - [`SubmissionError::DuplicateEntity`] on an id collision
    fn bulk_fill_from(
        &mut self,
        staging: &mut dyn TypeSafeStore,
        group: GroupId,
    ) -> SubmissionResult<Range<usize>>;

    /// Offers the entities in dense `slots` to the engines registered for
    /// this type, in slot order. `0..len()` offers every held entity.
    fn notify_engines(
        &self,
        group: GroupId,
        slots: Range<usize>,
        engines: &EngineRegistry,
        ctx: &ReactorContext<'_>,
    );

    /// Tells the engines registered for this type that every held entity
    /// of `group` is gone. Used when a whole group is dropped.
    fn notify_removed(&self, group: GroupId, engines: &EngineRegistry, ctx: &ReactorContext<'_>);

    /// Offers one entity that just arrived through a group swap.
    fn notify_swapped(
        &self,
        from: Egid,
        to: Egid,
        engines: &EngineRegistry,
        ctx: &ReactorContext<'_>,
    );

    /// Removes an entity, returning its component type-erased.
    fn remove_entity(&mut self, entity: EntityId) -> Option<Box<dyn Any + Send>>;

    /// Moves the component of `from` into `target` under the id of `to`.
    ///
    /// # Errors
    ///
    /// - [`SubmissionError::ComponentTypeMismatch`] if `target` holds another type
    /// - [`SubmissionError::EntityNotFound`] if `from` is not held
    /// - [`SubmissionError::DestinationOccupied`] if `to` is already in `target`
    fn move_entity(
        &mut self,
        from: Egid,
        target: &mut dyn TypeSafeStore,
        to: Egid,
    ) -> SubmissionResult<()>;

    /// Re-keys an entity inside this store.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`TypeSafeStore::move_entity`].
    fn rekey_entity(&mut self, from: Egid, to: Egid) -> SubmissionResult<()>;

    /// Removes every entity, keeping the allocation.
    fn clear(&mut self);

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for a single component type.
///
/// # Example
///
/// ```rust,ignore
/// let mut store: ComponentStore<Health> = ComponentStore::new();
/// store.insert(EntityId::new(0), Health(100))?;
/// ```
pub struct ComponentStore<C: Component> {
    /// Entity id of each dense slot.
    ids: Vec<EntityId>,
    /// The dense array of components.
    data: Vec<C>,
    /// Entity id to dense slot.
    index: HashMap<EntityId, usize>,
}

impl<C: Component> ComponentStore<C> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty store with room for `capacity` entities.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Number of entities held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `entity` is held.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    /// Inserts a component.
    ///
    /// # Errors
    ///
    /// Hands the component back if `entity` is already held. Existing data
    /// is never overwritten.
    pub fn insert(&mut self, entity: EntityId, component: C) -> Result<(), C> {
        if self.contains(entity) {
            return Err(component);
        }
        self.index.insert(entity, self.data.len());
        self.ids.push(entity);
        self.data.push(component);
        Ok(())
    }

    /// Gets a component by entity id.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&C> {
        self.index.get(&entity).map(|&slot| &self.data[slot])
    }

    /// Gets a mutable component by entity id.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut C> {
        match self.index.get(&entity) {
            Some(&slot) => Some(&mut self.data[slot]),
            None => None,
        }
    }

    /// Removes a component, returning it.
    pub fn remove(&mut self, entity: EntityId) -> Option<C> {
        let slot = self.index.remove(&entity)?;
        self.ids.swap_remove(slot);
        let component = self.data.swap_remove(slot);
        // The former last element now lives in `slot`.
        if let Some(&moved) = self.ids.get(slot) {
            self.index.insert(moved, slot);
        }
        Some(component)
    }

    /// Entity ids in iteration order.
    #[inline]
    #[must_use]
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Components in iteration order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    /// Components in iteration order, mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.data
    }

    /// Iterates over all components with their entity ids.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> {
        self.ids.iter().copied().zip(self.data.iter())
    }

    /// Iterates mutably over all components with their entity ids.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut C)> {
        self.ids.iter().copied().zip(self.data.iter_mut())
    }

    /// Removes every component, keeping the allocation.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.data.clear();
        self.index.clear();
    }

    fn downcast_target<'a>(
        &self,
        target: &'a mut dyn TypeSafeStore,
    ) -> SubmissionResult<&'a mut Self> {
        let found = target.component_type();
        target
            .as_any_mut()
            .downcast_mut::<Self>()
            .ok_or(SubmissionError::ComponentTypeMismatch {
                expected: ComponentType::of::<C>(),
                found,
            })
    }
}

impl<C: Component> Default for ComponentStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> TypeSafeStore for ComponentStore<C> {
    fn component_type(&self) -> ComponentType {
        ComponentType::of::<C>()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    fn entity_ids(&self) -> &[EntityId] {
        &self.ids
    }

    fn create_empty_of_same_type(&self) -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    fn bulk_fill_from(
        &mut self,
        staging: &mut dyn TypeSafeStore,
        group: GroupId,
    ) -> SubmissionResult<Range<usize>> {
        let staging = self.downcast_target(staging)?;

        if let Some(&entity) = staging.ids.iter().find(|id| self.index.contains_key(*id)) {
            return Err(SubmissionError::DuplicateEntity {
                egid: Egid::new(entity, group),
                component: ComponentType::of::<C>(),
            });
        }

        let first = self.data.len();
        let count = staging.data.len();
        self.ids.reserve(count);
        self.data.reserve(count);
        self.index.reserve(count);

        staging.index.clear();
        for (entity, component) in staging.ids.drain(..).zip(staging.data.drain(..)) {
            self.index.insert(entity, self.data.len());
            self.ids.push(entity);
            self.data.push(component);
        }

        Ok(first..self.data.len())
    }

    fn notify_engines(
        &self,
        group: GroupId,
        slots: Range<usize>,
        engines: &EngineRegistry,
        ctx: &ReactorContext<'_>,
    ) {
        let (Some(ids), Some(data)) = (self.ids.get(slots.clone()), self.data.get(slots)) else {
            return;
        };
        for reactor in engines.reactors_for(ComponentType::of::<C>()) {
            for (&entity, component) in ids.iter().zip(data) {
                reactor.added(Egid::new(entity, group), component, ctx);
            }
        }
    }

    fn notify_removed(&self, group: GroupId, engines: &EngineRegistry, ctx: &ReactorContext<'_>) {
        let component_type = ComponentType::of::<C>();
        for (entity, component) in self.iter() {
            engines.dispatch_removed(component_type, Egid::new(entity, group), component, ctx);
        }
    }

    fn notify_swapped(
        &self,
        from: Egid,
        to: Egid,
        engines: &EngineRegistry,
        ctx: &ReactorContext<'_>,
    ) {
        let Some(component) = self.get(to.entity) else {
            return;
        };
        for reactor in engines.reactors_for(ComponentType::of::<C>()) {
            reactor.swapped(from, to, component, ctx);
        }
    }

    fn remove_entity(&mut self, entity: EntityId) -> Option<Box<dyn Any + Send>> {
        self.remove(entity)
            .map(|component| Box::new(component) as Box<dyn Any + Send>)
    }

    fn move_entity(
        &mut self,
        from: Egid,
        target: &mut dyn TypeSafeStore,
        to: Egid,
    ) -> SubmissionResult<()> {
        let target = self.downcast_target(target)?;
        if target.contains(to.entity) {
            return Err(SubmissionError::DestinationOccupied { egid: to });
        }
        let component = self.remove(from.entity).ok_or(SubmissionError::EntityNotFound {
            egid: from,
            component: ComponentType::of::<C>(),
        })?;
        target
            .insert(to.entity, component)
            .map_err(|_| SubmissionError::DestinationOccupied { egid: to })
    }

    fn rekey_entity(&mut self, from: Egid, to: Egid) -> SubmissionResult<()> {
        if from.entity == to.entity {
            return Ok(());
        }
        if self.contains(to.entity) {
            return Err(SubmissionError::DestinationOccupied { egid: to });
        }
        let component = self.remove(from.entity).ok_or(SubmissionError::EntityNotFound {
            egid: from,
            component: ComponentType::of::<C>(),
        })?;
        self.insert(to.entity, component)
            .map_err(|_| SubmissionError::DestinationOccupied { egid: to })
    }

    fn clear(&mut self) {
        ComponentStore::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

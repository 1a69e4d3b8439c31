//! # Engines
//!
//! Engines are the consumers of submitted entities. An engine declares the
//! component types it reacts to by implementing [`Reactor<C>`] once per type
//! and registering itself with the [`EngineRegistry`] for each of them.
//!
//! The registry owns the type filter: stores hand it their component type
//! and only the reactors registered for that type are called.
//!
//! ```text
//!   ComponentStore<Health> ──notify──▶ EngineRegistry ──Health──▶ [HealthBar, Regen]
//!                                                   ╰─Speed───▶ [Movement]
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ecs::{Component, ComponentType, Egid, GroupEntityDb};
use crate::submission::EntitySubmitter;

/// What an engine sees while it is being notified.
///
/// The database is complete for the current pass; anything staged or
/// enqueued through the submitter becomes visible on the next pass.
pub struct ReactorContext<'a> {
    database: &'a GroupEntityDb,
    submitter: &'a EntitySubmitter,
}

impl<'a> ReactorContext<'a> {
    pub(crate) fn new(database: &'a GroupEntityDb, submitter: &'a EntitySubmitter) -> Self {
        Self {
            database,
            submitter,
        }
    }

    /// Read access to the database.
    #[inline]
    #[must_use]
    pub fn database(&self) -> &'a GroupEntityDb {
        self.database
    }

    /// Producer handle for staging entities and enqueuing operations.
    #[inline]
    #[must_use]
    pub fn submitter(&self) -> &'a EntitySubmitter {
        self.submitter
    }
}

/// Reaction of an engine to entity lifecycle events for component type `C`.
///
/// Only `on_add` is required.
pub trait Reactor<C: Component>: Send + 'static {
    /// An entity with a `C` component became visible in the database.
    fn on_add(&mut self, egid: Egid, component: &C, ctx: &ReactorContext<'_>);

    /// An entity's `C` component was removed from the database.
    fn on_remove(&mut self, _egid: Egid, _component: &C, _ctx: &ReactorContext<'_>) {}

    /// An entity's `C` component moved to another group.
    fn on_swap(&mut self, _from: Egid, _to: Egid, _component: &C, _ctx: &ReactorContext<'_>) {}
}

/// Type-erased reactor, one per (engine, component type) registration.
pub(crate) trait ErasedReactor: Send + Sync {
    fn engine_name(&self) -> &'static str;
    fn added(&self, egid: Egid, component: &dyn Any, ctx: &ReactorContext<'_>);
    fn removed(&self, egid: Egid, component: &dyn Any, ctx: &ReactorContext<'_>);
    fn swapped(&self, from: Egid, to: Egid, component: &dyn Any, ctx: &ReactorContext<'_>);
}

struct TypedReactor<C, E> {
    engine: Arc<Mutex<E>>,
    _component: PhantomData<fn(&C)>,
}

impl<C, E> TypedReactor<C, E>
where
    C: Component,
    E: Reactor<C>,
{
    fn downcast(component: &dyn Any) -> Option<&C> {
        let component = component.downcast_ref::<C>();
        debug_assert!(component.is_some(), "reactor dispatched with wrong component type");
        component
    }
}

impl<C, E> ErasedReactor for TypedReactor<C, E>
where
    C: Component,
    E: Reactor<C>,
{
    fn engine_name(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn added(&self, egid: Egid, component: &dyn Any, ctx: &ReactorContext<'_>) {
        if let Some(component) = Self::downcast(component) {
            self.engine.lock().on_add(egid, component, ctx);
        }
    }

    fn removed(&self, egid: Egid, component: &dyn Any, ctx: &ReactorContext<'_>) {
        if let Some(component) = Self::downcast(component) {
            self.engine.lock().on_remove(egid, component, ctx);
        }
    }

    fn swapped(&self, from: Egid, to: Egid, component: &dyn Any, ctx: &ReactorContext<'_>) {
        if let Some(component) = Self::downcast(component) {
            self.engine.lock().on_swap(from, to, component, ctx);
        }
    }
}

/// All registered engines, indexed by the component type they accept.
#[derive(Default)]
pub struct EngineRegistry {
    reactors: HashMap<ComponentType, Vec<Box<dyn ErasedReactor>>>,
}

impl EngineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` for component type `C`.
    ///
    /// An engine reacting to several types is registered once per type,
    /// sharing the same `Arc`.
    pub fn register<C, E>(&mut self, engine: Arc<Mutex<E>>)
    where
        C: Component,
        E: Reactor<C>,
    {
        let component = ComponentType::of::<C>();
        let reactor = TypedReactor::<C, E> {
            engine,
            _component: PhantomData,
        };
        tracing::debug!(
            engine = reactor.engine_name(),
            component = %component,
            "engine registered"
        );
        self.reactors
            .entry(component)
            .or_default()
            .push(Box::new(reactor));
    }

    /// Whether any engine accepts `component`.
    #[must_use]
    pub fn accepts(&self, component: ComponentType) -> bool {
        self.reactors
            .get(&component)
            .is_some_and(|reactors| !reactors.is_empty())
    }

    /// Total number of (engine, component type) registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reactors.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn reactors_for(&self, component: ComponentType) -> &[Box<dyn ErasedReactor>] {
        self.reactors.get(&component).map_or(&[][..], Vec::as_slice)
    }

    pub(crate) fn dispatch_removed(
        &self,
        component_type: ComponentType,
        egid: Egid,
        component: &dyn Any,
        ctx: &ReactorContext<'_>,
    ) {
        for reactor in self.reactors_for(component_type) {
            reactor.removed(egid, component, ctx);
        }
    }
}

//! # Engines Root
//!
//! Owns the database and the engines, and runs submission passes.
//!
//! ## Pass Layout
//!
//! ```text
//!   submit_entities()
//!   ├── Phase 1: structural operations
//!   │     snapshot the live queue into the transient list (live queue now empty)
//!   │     apply Swap / Remove / RemoveGroup in enqueue order
//!   │     notify on_swap / on_remove after each one
//!   │
//!   └── Phase 2: additions (only if something is staged)
//!         swap the staging slots, move "other" out
//!         merge every (group, type) store into the database
//!         notify on_add for every merged entity
//!         clear "other" and hand it back
//! ```
//!
//! Anything engines stage or enqueue while being notified lands in the live
//! queues and is applied on the next pass.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use super::operation::{Operation, QueuedOperation};
use super::submitter::EntitySubmitter;
use crate::config::{FaultPolicy, SubmissionConfig, SwapIdPolicy};
use crate::ecs::{Component, ComponentType, EntityId, GroupEntityDb, GroupId};
use crate::engine::{EngineRegistry, Reactor, ReactorContext};
use crate::error::{SubmissionError, SubmissionResult};

/// What one submission pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmissionStats {
    /// Structural operations applied successfully.
    pub operations_applied: usize,
    /// Structural operations that faulted.
    pub operations_failed: usize,
    /// Components merged into the database.
    pub components_added: usize,
    /// Groups that received new components.
    pub groups_flushed: usize,
    /// Whether the merge of staged additions was aborted.
    pub flush_failed: bool,
}

impl SubmissionStats {
    /// Whether the pass had nothing to do.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// The submission driver.
///
/// One instance exists per simulated world; dropping it drops the database.
pub struct EnginesRoot {
    database: GroupEntityDb,
    engines: EngineRegistry,
    submitter: EntitySubmitter,
    /// Working list of the current pass. Kept between passes for its allocation.
    transient_operations: Vec<QueuedOperation>,
    config: SubmissionConfig,
    pass_count: u64,
}

impl EnginesRoot {
    /// Creates an empty root.
    #[must_use]
    pub fn new(config: SubmissionConfig) -> Self {
        tracing::debug!(
            fault_policy = ?config.fault_policy,
            swap_ids = ?config.swap_ids,
            verify_indices = config.verify_indices,
            "engines root created"
        );
        Self {
            database: GroupEntityDb::new(),
            engines: EngineRegistry::new(),
            submitter: EntitySubmitter::new(&config),
            transient_operations: Vec::with_capacity(config.operation_capacity),
            config,
            pass_count: 0,
        }
    }

    /// A producer handle. Clones share the same queues.
    #[must_use]
    pub fn submitter(&self) -> EntitySubmitter {
        self.submitter.clone()
    }

    /// Read access to the database.
    #[inline]
    #[must_use]
    pub fn database(&self) -> &GroupEntityDb {
        &self.database
    }

    /// The registered engines.
    #[inline]
    #[must_use]
    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// The active configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Number of passes completed.
    #[inline]
    #[must_use]
    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    /// Registers `engine` for component type `C`.
    pub fn add_reactor<C, E>(&mut self, engine: Arc<Mutex<E>>)
    where
        C: Component,
        E: Reactor<C>,
    {
        self.engines.register::<C, E>(engine);
    }

    /// Runs one submission pass.
    ///
    /// # Errors
    ///
    /// Only under [`FaultPolicy::FailFast`]:
    /// - [`SubmissionError::Operation`] for the first structural operation
    ///   that faulted; the rest of the pass is skipped and staged additions
    ///   wait for the next pass
    /// - [`SubmissionError::Flush`] if merging staged additions failed
    ///
    /// Regardless of policy, [`SubmissionError::InconsistentIndex`] if index
    /// verification is enabled and fails.
    pub fn submit_entities(&mut self) -> SubmissionResult<SubmissionStats> {
        let span = tracing::debug_span!("submit_entities", pass = self.pass_count);
        let _enter = span.enter();

        let mut stats = SubmissionStats::default();
        self.apply_operations(&mut stats)?;
        self.flush_additions(&mut stats)?;

        if self.config.verify_indices {
            self.database.check_consistency()?;
        }

        self.pass_count += 1;
        if !stats.is_idle() {
            tracing::debug!(
                operations_applied = stats.operations_applied,
                operations_failed = stats.operations_failed,
                components_added = stats.components_added,
                groups_flushed = stats.groups_flushed,
                "submission pass complete"
            );
        }
        Ok(stats)
    }

    // =========================================================================
    // Phase 1
    // =========================================================================

    fn apply_operations(&mut self, stats: &mut SubmissionStats) -> SubmissionResult<()> {
        self.submitter.take_operations(&mut self.transient_operations);
        if self.transient_operations.is_empty() {
            return Ok(());
        }
        let mut operations = std::mem::take(&mut self.transient_operations);

        let mut outcome = Ok(());
        for (index, queued) in operations.iter().enumerate() {
            let applied = Self::apply(
                &mut self.database,
                &self.engines,
                &self.submitter,
                self.config.swap_ids,
                queued,
            );
            let Err(error) = applied else {
                stats.operations_applied += 1;
                continue;
            };

            stats.operations_failed += 1;
            let report = queued.report();
            let entity = report.entity.map(EntityId::raw);
            let to_group = report.to_group.map(GroupId::raw);
            tracing::error!(
                kind = report.kind,
                entity = ?entity,
                from_group = report.from_group.raw(),
                to_group = ?to_group,
                origin = %report.origin,
                error = %error,
                "entity operation failed"
            );

            if self.config.fault_policy == FaultPolicy::FailFast {
                let skipped = operations.len() - index - 1;
                if skipped > 0 {
                    tracing::warn!(skipped, "pass aborted, remaining operations dropped");
                }
                outcome = Err(SubmissionError::Operation {
                    report,
                    source: Box::new(error),
                });
                break;
            }
        }

        operations.clear();
        self.transient_operations = operations;
        outcome
    }

    fn apply(
        database: &mut GroupEntityDb,
        engines: &EngineRegistry,
        submitter: &EntitySubmitter,
        swap_ids: SwapIdPolicy,
        queued: &QueuedOperation,
    ) -> SubmissionResult<()> {
        let types = queued.descriptor.types();
        match queued.operation {
            Operation::Swap { from, to_group } => {
                let (to, moved) = database.swap_entity(
                    from,
                    to_group,
                    types,
                    swap_ids,
                    submitter.highest_staged_id(to_group),
                )?;
                let ctx = ReactorContext::new(database, submitter);
                for component in moved {
                    if let Some(store) = database.store(to.group, component) {
                        store
                            .read_recursive()
                            .notify_swapped(from, to, engines, &ctx);
                    }
                }
            }
            Operation::Remove { egid } => {
                let removed = database.remove_entity(egid, types)?;
                let ctx = ReactorContext::new(database, submitter);
                for (component, value) in &removed {
                    engines.dispatch_removed(*component, egid, &**value, &ctx);
                }
            }
            Operation::RemoveGroup { group } => {
                let stores = database.remove_group(group)?;
                let ctx = ReactorContext::new(database, submitter);
                for store in stores.values() {
                    store.read_recursive().notify_removed(group, engines, &ctx);
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Phase 2
    // =========================================================================

    fn flush_additions(&mut self, stats: &mut SubmissionStats) -> SubmissionResult<()> {
        let Some(mut staged) = self.submitter.swap_additions() else {
            return Ok(());
        };
        let groups = staged.group_count();

        // Nothing is merged unless every staged store fits.
        let mut failure = staged
            .stores()
            .find_map(|(group, store)| self.database.validate_staging(group, store).err());

        let mut merged: Vec<(GroupId, ComponentType, Range<usize>)> = Vec::new();
        if failure.is_none() {
            for (group, store) in staged.stores_mut() {
                let component = store.component_type();
                match self.database.fill_from_staging(group, &mut **store) {
                    Ok(slots) => merged.push((group, component, slots)),
                    Err(error) => {
                        failure = Some(error);
                        break;
                    }
                }
            }
        }

        if let Some(error) = failure {
            stats.flush_failed = true;
            tracing::error!(error = %error, "entity flush failed");
            let dropped = staged.len();
            if dropped > 0 {
                tracing::warn!(dropped, "staged components dropped by failed flush");
            }
            self.submitter.return_additions(staged);
            return match self.config.fault_policy {
                FaultPolicy::FailFast => Err(SubmissionError::Flush {
                    source: Box::new(error),
                }),
                FaultPolicy::LogAndContinue => Ok(()),
            };
        }

        stats.groups_flushed = groups;
        stats.components_added = merged.iter().map(|(_, _, slots)| slots.len()).sum();

        // Database is complete for this pass from here on.
        merged.sort_by_key(|(group, _, _)| *group);
        let ctx = ReactorContext::new(&self.database, &self.submitter);
        for (group, component, slots) in merged {
            if !self.engines.accepts(component) {
                continue;
            }
            if let Some(store) = self.database.store(group, component) {
                store
                    .read_recursive()
                    .notify_engines(group, slots, &self.engines, &ctx);
            }
        }

        self.submitter.return_additions(staged);
        Ok(())
    }
}

impl Default for EnginesRoot {
    fn default() -> Self {
        Self::new(SubmissionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Egid;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    fn root(fault_policy: FaultPolicy) -> EnginesRoot {
        EnginesRoot::new(SubmissionConfig {
            fault_policy,
            verify_indices: true,
            ..SubmissionConfig::default()
        })
    }

    #[test]
    fn test_idle_pass() {
        let mut root = root(FaultPolicy::FailFast);
        let stats = root.submit_entities().unwrap();
        assert!(stats.is_idle());
        assert_eq!(root.pass_count(), 1);
    }

    #[test]
    fn test_stats_count_work() {
        let mut root = root(FaultPolicy::FailFast);
        let submitter = root.submitter();
        submitter.add_component(Egid::from_raw(0, 0), Health(1)).unwrap();
        submitter.add_component(Egid::from_raw(1, 0), Health(2)).unwrap();
        submitter.add_component(Egid::from_raw(0, 1), Health(3)).unwrap();

        let stats = root.submit_entities().unwrap();
        assert_eq!(stats.components_added, 3);
        assert_eq!(stats.groups_flushed, 2);
        assert!(!stats.flush_failed);

        submitter.remove_entity(Egid::from_raw(0, 0));
        let stats = root.submit_entities().unwrap();
        assert_eq!(stats.operations_applied, 1);
        assert_eq!(stats.components_added, 0);
    }

    #[test]
    fn test_fail_fast_keeps_staged_additions() {
        let mut root = root(FaultPolicy::FailFast);
        let submitter = root.submitter();
        submitter.remove_entity(Egid::from_raw(9, 9));
        submitter.add_component(Egid::from_raw(0, 0), Health(1)).unwrap();

        let err = root.submit_entities().unwrap_err();
        assert!(matches!(err, SubmissionError::Operation { .. }));
        assert!(root.database().get::<Health>(Egid::from_raw(0, 0)).is_none());
        assert_eq!(submitter.staged_count(), 1);

        root.submit_entities().unwrap();
        assert_eq!(root.database().get::<Health>(Egid::from_raw(0, 0)), Some(Health(1)));
    }

    #[test]
    fn test_flush_failure_policies() {
        for policy in [FaultPolicy::FailFast, FaultPolicy::LogAndContinue] {
            let mut root = root(policy);
            let submitter = root.submitter();
            submitter.add_component(Egid::from_raw(0, 0), Health(1)).unwrap();
            root.submit_entities().unwrap();

            // Same id again, in a later cycle: collides on merge.
            submitter.add_component(Egid::from_raw(0, 0), Health(2)).unwrap();
            let result = root.submit_entities();
            match policy {
                FaultPolicy::FailFast => {
                    assert!(matches!(result, Err(SubmissionError::Flush { .. })));
                }
                FaultPolicy::LogAndContinue => assert!(result.unwrap().flush_failed),
            }

            assert_eq!(root.database().get::<Health>(Egid::from_raw(0, 0)), Some(Health(1)));
            assert_eq!(submitter.staged_count(), 0);
        }
    }
}

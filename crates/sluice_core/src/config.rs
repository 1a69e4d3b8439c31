//! # Submission Configuration
//!
//! Loaded once at startup, usually from TOML:
//!
//! ```toml
//! fault_policy = "log_and_continue"
//! swap_ids = "allocate"
//! verify_indices = false
//! operation_capacity = 1024
//! ```
//!
//! Every field is optional; missing fields take the build-dependent
//! defaults of [`SubmissionConfig::default`].

use std::path::Path;

use serde::Deserialize;

use crate::error::{SubmissionError, SubmissionResult};

/// What a submission pass does when a structural operation fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the fault with full operation context, then abort the pass.
    FailFast,
    /// Log the fault and carry on with the next operation.
    LogAndContinue,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::FailFast
        } else {
            Self::LogAndContinue
        }
    }
}

/// Which id an entity gets in its destination group when swapped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapIdPolicy {
    /// Keep the entity id. A collision in the destination group is a fault.
    #[default]
    Preserve,
    /// Take a fresh id, above every id the destination group has seen.
    Allocate,
}

/// Configuration of an [`EnginesRoot`](crate::EnginesRoot).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmissionConfig {
    /// Behavior on structural operation faults.
    pub fault_policy: FaultPolicy,
    /// Destination id rule for group swaps.
    pub swap_ids: SwapIdPolicy,
    /// Check that both database indices agree after every pass.
    pub verify_indices: bool,
    /// Initial capacity of the pending operation queues.
    pub operation_capacity: usize,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            fault_policy: FaultPolicy::default(),
            swap_ids: SwapIdPolicy::default(),
            verify_indices: cfg!(debug_assertions),
            operation_capacity: 256,
        }
    }
}

impl SubmissionConfig {
    /// Fail-fast configuration regardless of build profile.
    #[must_use]
    pub fn development() -> Self {
        Self {
            fault_policy: FaultPolicy::FailFast,
            verify_indices: true,
            ..Self::default()
        }
    }

    /// Best-effort configuration regardless of build profile.
    #[must_use]
    pub fn production() -> Self {
        Self {
            fault_policy: FaultPolicy::LogAndContinue,
            verify_indices: false,
            ..Self::default()
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::InvalidConfig`] if the text is not valid TOML or
    /// holds unknown keys or values.
    pub fn from_toml_str(text: &str) -> SubmissionResult<Self> {
        toml::from_str(text).map_err(|e| SubmissionError::InvalidConfig(e.to_string()))
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// [`SubmissionError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SubmissionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SubmissionError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }
}

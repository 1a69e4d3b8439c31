//! # Synchronization Primitives for Deferred Submission
//!
//! No locks on the read side. No half-written structures.
//!
//! ## The Problem
//!
//! ```text
//! Flush:     READ staged entities, merge them into the database
//! Engines:   WRITE new staged entities while being notified
//!
//! One container for both: the flush iterates a map that is being mutated.
//! ```
//!
//! ## The Solution: Double Buffering
//!
//! ```text
//! Cycle N:
//!   Producers write to slot A
//!
//! Submission:
//!   SWAP (flip the role index)
//!   Flush reads slot A
//!   Producers write to slot B
//!   Clear slot A, keep its allocation
//! ```

mod double_buffer;

pub use double_buffer::DoubleBuffered;

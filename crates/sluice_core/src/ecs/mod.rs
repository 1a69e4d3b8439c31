//! # Entity Storage
//!
//! Identifiers, component keys, per-type stores and the group database.
//!
//! ## Design Philosophy
//!
//! - An entity is an (entity id, group id) pair; ids are unique per group only
//! - Each (group, component type) slot has exactly one dense store
//! - Stores are reached by group or by type; both paths share one instance
//! - Readers only see the database between submission passes

mod component;
mod database;
mod entity;
mod storage;

pub use component::{Component, ComponentType};
pub use database::{GroupEntityDb, StoreRef};
pub use entity::{Egid, EntityId, GroupId};
pub use storage::{ComponentStore, SharedStore, TypeSafeStore};

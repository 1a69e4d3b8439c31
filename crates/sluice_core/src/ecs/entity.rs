//! # Entity Identity
//!
//! Entities are identified by a pair:
//! - An entity id, unique only inside its group
//! - A group id, partitioning the database into disjoint tables
//!
//! The pair is the [`Egid`]. Two entities in different groups may share an
//! entity id.

use std::fmt;

/// Identifier of an entity inside a single group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates an entity id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value of the id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the id immediately after this one, or `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a group (a logical table of entities).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct GroupId(u32);

impl GroupId {
    /// Creates a group id from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw value of the id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full identity of an entity: entity id plus the group it lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Egid {
    /// Id of the entity inside `group`.
    pub entity: EntityId,
    /// Group the entity belongs to.
    pub group: GroupId,
}

impl Egid {
    /// Creates an EGID from its parts.
    #[inline]
    #[must_use]
    pub const fn new(entity: EntityId, group: GroupId) -> Self {
        Self { entity, group }
    }

    /// Shorthand for building an EGID from raw ids.
    #[inline]
    #[must_use]
    pub const fn from_raw(entity: u32, group: u32) -> Self {
        Self::new(EntityId::new(entity), GroupId::new(group))
    }

    /// Returns the same entity id placed in another group.
    #[inline]
    #[must_use]
    pub const fn with_group(self, group: GroupId) -> Self {
        Self::new(self.entity, group)
    }

    /// Packs the EGID into a single `u64` (group in the upper 32 bits).
    #[inline]
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        ((self.group.raw() as u64) << 32) | (self.entity.raw() as u64)
    }
}

impl fmt::Display for Egid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.entity, self.group)
    }
}

//! # Component Types
//!
//! Components are pure data containers with no behavior. Every component
//! type gets its own storage per group, so the type itself is the key used
//! by the database and by engine dispatch.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Send + Sync`: stores are shared between the database indices
/// - `'static`: the type is used as a runtime key
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Debug, PartialEq)]
/// struct Health(u32);
///
/// impl Component for Health {}
/// ```
pub trait Component: Send + Sync + 'static {}

/// Runtime key for a component type.
///
/// Equality and hashing only consider the [`TypeId`]; the name is kept for
/// diagnostics.
#[derive(Clone, Copy, Debug)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
}

impl ComponentType {
    /// Returns the key for component type `C`.
    #[inline]
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: std::any::type_name::<C>(),
        }
    }

    /// Returns the underlying type id.
    #[inline]
    #[must_use]
    pub fn type_id(self) -> TypeId {
        self.id
    }

    /// Returns the full type name of the component.
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        self.name
    }

    /// Returns the type name without its module path.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    impl Component for Position {}

    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn test_component_type_identity() {
        assert_eq!(ComponentType::of::<Position>(), ComponentType::of::<Position>());
        assert_ne!(ComponentType::of::<Position>(), ComponentType::of::<Velocity>());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(ComponentType::of::<Position>().short_name(), "Position");
        assert_eq!(ComponentType::of::<Velocity>().to_string(), "Velocity");
    }
}

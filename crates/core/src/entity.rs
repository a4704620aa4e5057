//! Entity traits: identity + continuity across state changes.

use crate::id::UserId;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// An entity owned by a business user.
///
/// Owned entities are only ever visible to their owner; stores key them by
/// `(owner, id)` so a lookup under the wrong owner simply finds nothing.
pub trait OwnedEntity: Entity {
    fn owner_id(&self) -> &UserId;
}

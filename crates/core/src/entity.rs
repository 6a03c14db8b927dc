//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Entities inside an aggregate (e.g. a case stage) are addressed by a local
/// identifier that stays stable while their attributes change.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

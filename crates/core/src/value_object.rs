//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Resolved consumables, cut dimensions and attributions are values: two with
/// the same fields are the same thing, and they are never edited in place. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

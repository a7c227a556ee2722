//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. A remember
/// token is one: two tokens with the same characters are the same credential,
/// and "changing" a token means minting a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

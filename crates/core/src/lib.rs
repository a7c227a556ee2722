//! `tollgate-core` — identity building blocks shared by the session layer.
//!
//! This crate contains **pure** primitives (no cookie or request concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{StoreError, StoreResult};
pub use id::UserId;
pub use value_object::ValueObject;

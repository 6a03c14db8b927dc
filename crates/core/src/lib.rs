//! `chancery-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod actor;
pub mod aggregate;
pub mod entity;
pub mod error;
pub mod file;
pub mod id;
pub mod value_object;

pub use actor::{Actor, StaffRole};
pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use file::FileRef;
pub use id::{AggregateId, ClientId, UserId};
pub use value_object::ValueObject;

//! `rinkside-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no IO, no async).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use value_object::{Email, PhoneNumber, ValueObject};

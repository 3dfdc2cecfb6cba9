//! `stockwise-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! the error model, typed identifiers for stock ledgers, and value-object markers.

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{LocationId, ProductId};
pub use value_object::ValueObject;

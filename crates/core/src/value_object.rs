//! Value object trait: equality by value, not identity.
//!
//! Ledger entries, derived periods and rates carry no identity of their own;
//! two of them with the same attribute values are interchangeable.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. The engine builds
/// them fresh on every estimation call and never mutates them afterwards, so they
/// can be shared freely between threads estimating different ledgers.
///
/// The trait requires:
/// - **Clone**: value objects are cheap to copy
/// - **PartialEq**: compared by attribute values (floats included, so no `Eq`)
/// - **Debug**: shows up in logs and test failures
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

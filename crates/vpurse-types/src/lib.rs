//! vpurse Types - Canonical value types for virtual purses
//!
//! This crate has zero dependencies on other vpurse crates. It defines:
//!
//! - [`Brand`]: the identity of one fungible asset kind
//! - [`Amount`]: a brand-scoped quantity, generic over its magnitude
//! - [`AmountValue`]: the magnitude algebra (natural numbers, sets)
//! - [`ERef`]: a reference that is either settled or still pending
//!
//! # Invariants
//!
//! 1. Amounts of different brands never combine
//! 2. Magnitudes are never negative
//! 3. Brand equality is identity, never the alleged name

pub mod amount;
pub mod eref;
pub mod error;

pub use amount::*;
pub use eref::*;
pub use error::*;

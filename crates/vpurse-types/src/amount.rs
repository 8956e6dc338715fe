//! Brand-scoped amounts with a pluggable magnitude algebra
//!
//! An [`Amount`] pairs a [`Brand`] with a magnitude. The magnitude type is
//! generic: [`Nat`] covers ordinary fungible assets, and `BTreeSet<String>`
//! covers assets whose units are distinct named items.

use crate::{AmountError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Natural-number magnitude used by fungible assets
pub type Nat = u128;

/// Identity of one asset kind
///
/// Two brands are equal only if they are the same brand. The alleged name
/// is for display and is never compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    id: Uuid,
    alleged_name: String,
}

impl Brand {
    /// Create a fresh, unique brand
    pub fn new(alleged_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alleged_name: alleged_name.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The name this brand claims; not authoritative
    pub fn alleged_name(&self) -> &str {
        &self.alleged_name
    }
}

impl PartialEq for Brand {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Brand {}

impl Hash for Brand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alleged_name)
    }
}

/// Magnitude algebra for an asset kind
///
/// Implementations form a commutative monoid under `checked_add` with
/// `empty()` as identity. `checked_sub` is partial: it is `None` whenever
/// the result would not be a valid magnitude.
pub trait AmountValue: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// The identity element
    fn empty() -> Self;

    fn is_empty(&self) -> bool;

    fn checked_add(&self, other: &Self) -> Option<Self>;

    fn checked_sub(&self, other: &Self) -> Option<Self>;

    /// Whether `other` could be subtracted from `self`
    fn is_gte(&self, other: &Self) -> bool {
        self.checked_sub(other).is_some()
    }
}

impl AmountValue for Nat {
    fn empty() -> Self {
        0
    }

    fn is_empty(&self) -> bool {
        *self == 0
    }

    fn checked_add(&self, other: &Self) -> Option<Self> {
        u128::checked_add(*self, *other)
    }

    fn checked_sub(&self, other: &Self) -> Option<Self> {
        u128::checked_sub(*self, *other)
    }

    fn is_gte(&self, other: &Self) -> bool {
        self >= other
    }
}

/// Set magnitude: each element is a distinct, indivisible unit.
/// Adding overlapping sets is rejected so no unit is counted twice.
impl AmountValue for BTreeSet<String> {
    fn empty() -> Self {
        BTreeSet::new()
    }

    fn is_empty(&self) -> bool {
        BTreeSet::is_empty(self)
    }

    fn checked_add(&self, other: &Self) -> Option<Self> {
        if !self.is_disjoint(other) {
            return None;
        }
        Some(self.union(other).cloned().collect())
    }

    fn checked_sub(&self, other: &Self) -> Option<Self> {
        if !other.is_subset(self) {
            return None;
        }
        Some(self.difference(other).cloned().collect())
    }

    fn is_gte(&self, other: &Self) -> bool {
        other.is_subset(self)
    }
}

/// A quantity of one brand
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount<V = Nat> {
    pub brand: Brand,
    pub value: V,
}

impl<V: AmountValue> Amount<V> {
    pub fn make(brand: Brand, value: V) -> Self {
        Self { brand, value }
    }

    /// The empty amount of a brand
    pub fn empty(brand: Brand) -> Self {
        Self {
            brand,
            value: V::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Check that this amount belongs to `brand`
    pub fn coerce(self, brand: &Brand) -> Result<Self> {
        if &self.brand != brand {
            return Err(AmountError::BrandMismatch {
                expected: brand.to_string(),
                actual: self.brand.to_string(),
            });
        }
        Ok(self)
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        self.same_brand(other)?;
        let value = self
            .value
            .checked_add(&other.value)
            .ok_or_else(|| AmountError::Overflow {
                left: self.to_string(),
                right: other.to_string(),
            })?;
        Ok(Self::make(self.brand.clone(), value))
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self> {
        self.same_brand(other)?;
        let value = self
            .value
            .checked_sub(&other.value)
            .ok_or_else(|| AmountError::Underflow {
                left: self.to_string(),
                right: other.to_string(),
            })?;
        Ok(Self::make(self.brand.clone(), value))
    }

    pub fn is_gte(&self, other: &Self) -> Result<bool> {
        self.same_brand(other)?;
        Ok(self.value.is_gte(&other.value))
    }

    pub fn is_equal(&self, other: &Self) -> Result<bool> {
        self.same_brand(other)?;
        Ok(self.value == other.value)
    }

    fn same_brand(&self, other: &Self) -> Result<()> {
        if self.brand != other.brand {
            return Err(AmountError::BrandMismatch {
                expected: self.brand.to_string(),
                actual: other.brand.to_string(),
            });
        }
        Ok(())
    }
}

impl<V: fmt::Debug> fmt::Display for Amount<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}", self.value, self.brand)
    }
}

//! # Money Module
//!
//! Provides the `Money` type for rupee amounts.
//!
//! ## Integer Paise
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rate ₹120.50/packet × 3 packets                                        │
//! │                                                                         │
//! │  f64:    120.5 * 3.0   = 361.5       (fine here, drifts on sums)        │
//! │  paise:  12050 * 3     = 36150       (exact, always)                    │
//! │                                                                         │
//! │  Every total, paid amount and balance on a Sale is paise.               │
//! │  Quantities may be fractional (0.5 kg loose tea), so quantity           │
//! │  multiplication rounds half away from zero to the nearest paisa.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use goldtea_core::money::Money;
//!
//! let rate = Money::from_paise(12050); // ₹120.50
//! let total = rate.multiply_quantity(3.0);
//! assert_eq!(total.paise(), 36150);
//! assert_eq!(total.to_string(), "₹361.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise (1/100 rupee).
///
/// Signed so that an overpaid sale can carry a negative balance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    ///
    /// ## Example
    /// ```rust
    /// use goldtea_core::money::Money;
    ///
    /// let price = Money::from_paise(1099);
    /// assert_eq!(price.paise(), 1099);
    /// ```
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Creates a Money value from whole rupees.
    #[inline]
    pub const fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Returns the whole-rupee portion (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the paise portion (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a rate by a (possibly fractional) quantity.
    ///
    /// Rounds half away from zero to the nearest paisa.
    ///
    /// ## Example
    /// ```rust
    /// use goldtea_core::money::Money;
    ///
    /// let rate = Money::from_paise(333); // ₹3.33 per 100gm
    /// assert_eq!(rate.multiply_quantity(1.5).paise(), 500); // 499.5 → 500
    /// ```
    pub fn multiply_quantity(&self, qty: f64) -> Self {
        Money((self.0 as f64 * qty).round() as i64)
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub fn clamp_non_negative(self) -> Self {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_paise() {
        let money = Money::from_paise(1099);
        assert_eq!(money.paise(), 1099);
        assert_eq!(money.rupees(), 10);
        assert_eq!(money.paise_part(), 99);
        assert_eq!(Money::from_rupees(150).paise(), 15000);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_paise(1099).to_string(), "₹10.99");
        assert_eq!(Money::from_paise(500).to_string(), "₹5.00");
        assert_eq!(Money::from_paise(-550).to_string(), "-₹5.50");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_paise(1000);
        let b = Money::from_paise(250);
        assert_eq!((a + b).paise(), 1250);
        assert_eq!((a - b).paise(), 750);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.paise(), 1500);
    }

    #[test]
    fn test_multiply_fractional_quantity() {
        let rate = Money::from_paise(12050);
        assert_eq!(rate.multiply_quantity(3.0).paise(), 36150);
        assert_eq!(rate.multiply_quantity(0.5).paise(), 6025);
        assert_eq!(Money::from_paise(333).multiply_quantity(1.5).paise(), 500);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_paise(-10).clamp_non_negative(), Money::zero());
        assert_eq!(Money::from_paise(10).clamp_non_negative().paise(), 10);
    }

    #[test]
    fn test_serializes_as_plain_number() {
        let json = serde_json::to_string(&Money::from_paise(4200)).unwrap();
        assert_eq!(json, "4200");
        let back: Money = serde_json::from_str("4200").unwrap();
        assert_eq!(back.paise(), 4200);
    }
}

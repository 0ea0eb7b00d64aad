//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SPLITTING A CREDIT SALE                                                │
//! │                                                                         │
//! │  Floating point:                                                        │
//! │    100.00 / 3 = 33.333... ×3 = 99.999...   → balance never reaches 0   │
//! │                                                                         │
//! │  Integer cents:                                                         │
//! │    10000 / 3 = 3333 remainder 1                                        │
//! │    → [3334, 3333, 3333]  sums to exactly 10000                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use mercado_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! let line = price * 3;                // $32.97
//! let parts = Money::from_cents(1000).split_even(3);
//! assert_eq!(parts.iter().copied().sum::<Money>(), Money::from_cents(1000));
//! assert_eq!(line.cents(), 3297);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: stock returns and balance adjustments can go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// Product.sale_price ──► SaleItem.unit_price ──► line total ──► Sale.total
///                                                                   │
///                  Installment.amount ◄── split_even ◄── remaining ─┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// Only for amounts already known to be in range (stored sale lines);
    /// request input goes through [`Money::try_mul`].
    ///
    /// ## Example
    /// ```rust
    /// use mercado_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// `self × qty`, or `AmountOverflow` when the result leaves i64.
    ///
    /// ```rust
    /// use mercado_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(299).try_mul(3).unwrap().cents(), 897);
    /// assert!(Money::from_cents(i64::MAX / 2 + 1).try_mul(2).is_err());
    /// ```
    pub fn try_mul(self, qty: i64) -> CoreResult<Money> {
        self.0
            .checked_mul(qty)
            .map(Money)
            .ok_or_else(|| CoreError::AmountOverflow(format!("{} × {}", self, qty)))
    }

    /// `self + other`, or `AmountOverflow` when the result leaves i64.
    pub fn try_add(self, other: Money) -> CoreResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| CoreError::AmountOverflow(format!("{} + {}", self, other)))
    }

    /// Splits the amount into `parts` whole-cent amounts that sum exactly to
    /// `self`.
    ///
    /// The remainder of the division goes one cent at a time to the earliest
    /// parts, so the first parts are never smaller than the later ones.
    ///
    /// ```text
    /// 10000 split 3  →  [3334, 3333, 3333]
    ///   100 split 6  →  [17, 17, 17, 17, 16, 16]
    /// ```
    ///
    /// Returns an empty vector when `parts` is zero.
    pub fn split_even(&self, parts: u32) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }

        let n = parts as i64;
        let base = self.0 / n;
        let remainder = self.0 % n;
        // For negative amounts the remainder is negative; spread it the same way
        let step = remainder.signum();

        (0..n)
            .map(|i| {
                if i < remainder.abs() {
                    Money(base + step)
                } else {
                    Money(base)
                }
            })
            .collect()
    }

    /// Returns `self / whole` in basis points (1/100 of a percent).
    ///
    /// Used for profit margins in reports. Zero when `whole` is zero.
    pub fn ratio_bps(&self, whole: Money) -> i64 {
        if whole.0 == 0 {
            return 0;
        }
        ((self.0 as i128 * 10_000) / whole.0 as i128) as i64
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display; the UI owns localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_cents(2_500);
        assert_eq!(price.try_mul(4).unwrap().cents(), 10_000);
        assert_eq!(price.try_add(Money::from_cents(1)).unwrap().cents(), 2_501);

        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert!(matches!(huge.try_mul(2), Err(CoreError::AmountOverflow(_))));
        assert!(matches!(huge.try_add(huge), Err(CoreError::AmountOverflow(_))));
    }

    #[test]
    fn test_split_even_distributes_remainder_first() {
        let parts = Money::from_cents(10_000).split_even(3);
        let cents: Vec<i64> = parts.iter().map(Money::cents).collect();
        assert_eq!(cents, vec![3334, 3333, 3333]);

        let parts = Money::from_cents(100).split_even(6);
        let cents: Vec<i64> = parts.iter().map(Money::cents).collect();
        assert_eq!(cents, vec![17, 17, 17, 17, 16, 16]);
    }

    #[test]
    fn test_split_even_sums_exactly() {
        for total in [1, 99, 1000, 12_345, 999_999] {
            for n in 1..=12 {
                let sum: Money = Money::from_cents(total).split_even(n).into_iter().sum();
                assert_eq!(sum.cents(), total, "total={} n={}", total, n);
            }
        }
    }

    #[test]
    fn test_split_even_edge_cases() {
        assert!(Money::from_cents(500).split_even(0).is_empty());
        assert_eq!(Money::from_cents(500).split_even(1), vec![Money::from_cents(500)]);

        // Fewer cents than parts: some parts are zero
        let cents: Vec<i64> = Money::from_cents(2)
            .split_even(4)
            .iter()
            .map(Money::cents)
            .collect();
        assert_eq!(cents, vec![1, 1, 0, 0]);
    }

    #[test]
    fn test_ratio_bps() {
        let profit = Money::from_cents(2_500);
        let revenue = Money::from_cents(10_000);
        assert_eq!(profit.ratio_bps(revenue), 2_500); // 25.00%
        assert_eq!(profit.ratio_bps(Money::zero()), 0);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());
        assert!(Money::from_cents(-1).is_negative());
        assert_eq!(Money::from_cents(-1).abs().cents(), 1);
    }
}

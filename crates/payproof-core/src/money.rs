//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Whole Pesos?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE UNIT PROBLEM                                                       │
//! │                                                                         │
//! │  Order totals arrive from the store as whole pesos.                    │
//! │  Receipts print centavos: "$ 50.500,00".                               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Pesos                                            │
//! │    Centavos are rounded half-up exactly once, at extraction time       │
//! │    "$ 50.500,50" → 5_050_050 centavos → 50_501 pesos                    │
//! │    Every sum, balance and comparison after that is integer math        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use payproof_core::money::Money;
//!
//! let total = Money::from_pesos(50_000);
//! let paid = Money::from_pesos(30_000) + Money::from_pesos(15_000);
//! assert_eq!((total - paid).pesos(), 5_000);
//! assert_eq!(total.to_string(), "$50.000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in whole pesos.
///
/// ## Design Decisions
/// - **i64 (signed)**: balances go negative when an order is over-paid
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Derives**: Full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole pesos.
    ///
    /// ## Example
    /// ```rust
    /// use payproof_core::money::Money;
    ///
    /// let amount = Money::from_pesos(15_000);
    /// assert_eq!(amount.pesos(), 15_000);
    /// ```
    #[inline]
    pub const fn from_pesos(pesos: i64) -> Self {
        Money(pesos)
    }

    /// Creates a Money value from centavos, rounding half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use payproof_core::money::Money;
    ///
    /// assert_eq!(Money::from_centavos_rounded(5_050_049).pesos(), 50_500);
    /// assert_eq!(Money::from_centavos_rounded(5_050_050).pesos(), 50_501);
    /// ```
    #[inline]
    pub const fn from_centavos_rounded(centavos: i64) -> Self {
        let pesos = centavos / 100;
        let rest = centavos % 100;
        if rest >= 50 {
            Money(pesos + 1)
        } else if rest <= -50 {
            Money(pesos - 1)
        } else {
            Money(pesos)
        }
    }

    /// Returns the value in whole pesos.
    #[inline]
    pub const fn pesos(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money the way Argentine receipts print it: `$50.500`, `-$500`.
///
/// ## Note
/// This is the format used in customer-facing notification variables.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}", sign, grouped)
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

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// Currency of an order or extracted amount.
///
/// The domain is single-currency; the enum exists so the stored column and
/// the wire format carry an explicit code instead of an implied one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Currency {
    /// Argentine peso.
    #[default]
    Ars,
}

impl Currency {
    /// ISO 4217 code.
    pub const fn code(&self) -> &'static str {
        match self {
            Currency::Ars => "ARS",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ARS" => Ok(Currency::Ars),
            _ => Err(ValidationError::NotAllowed {
                field: "currency".to_string(),
                allowed: vec!["ARS".to_string()],
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands_with_dots() {
        assert_eq!(Money::from_pesos(0).to_string(), "$0");
        assert_eq!(Money::from_pesos(999).to_string(), "$999");
        assert_eq!(Money::from_pesos(1_000).to_string(), "$1.000");
        assert_eq!(Money::from_pesos(50_500).to_string(), "$50.500");
        assert_eq!(Money::from_pesos(1_234_567).to_string(), "$1.234.567");
        assert_eq!(Money::from_pesos(-500).to_string(), "-$500");
        assert_eq!(Money::from_pesos(-12_000).to_string(), "-$12.000");
    }

    #[test]
    fn test_centavo_rounding_is_half_up() {
        assert_eq!(Money::from_centavos_rounded(100_000).pesos(), 1_000);
        assert_eq!(Money::from_centavos_rounded(100_049).pesos(), 1_000);
        assert_eq!(Money::from_centavos_rounded(100_050).pesos(), 1_001);
        assert_eq!(Money::from_centavos_rounded(-150).pesos(), -2);
        assert_eq!(Money::from_centavos_rounded(-149).pesos(), -1);
    }

    #[test]
    fn test_rounding_at_the_limits() {
        assert_eq!(Money::from_centavos_rounded(i64::MAX).pesos(), i64::MAX / 100);
        assert_eq!(Money::from_centavos_rounded(i64::MIN).pesos(), i64::MIN / 100);
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_pesos(30_000);
        let b = Money::from_pesos(25_000);

        assert_eq!((a - b).pesos(), 5_000);
        assert_eq!((b - a).pesos(), -5_000);
        assert_eq!((a + b).pesos(), 55_000);
        assert_eq!((-a).pesos(), -30_000);

        let total: Money = [a, b, Money::from_pesos(1)].into_iter().sum();
        assert_eq!(total.pesos(), 55_001);
    }

    #[test]
    fn test_zero_and_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_pesos(1).is_positive());
        assert!(Money::from_pesos(-1).is_negative());
        assert_eq!(Money::from_pesos(-7).abs().pesos(), 7);
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!("ars".parse::<Currency>().unwrap(), Currency::Ars);
        assert_eq!(" ARS ".parse::<Currency>().unwrap(), Currency::Ars);
        assert!("USD".parse::<Currency>().is_err());
        assert_eq!(Currency::default().to_string(), "ARS");
    }
}

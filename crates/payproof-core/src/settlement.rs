//! # Settlement
//!
//! Payment aggregation and payment status resolution.
//!
//! ## Resolver Policy
//! ```text
//!   balance = order_total - total_confirmed          (tolerance = 1000)
//!
//!   ◄──── credit ────┤──────── confirmed_total ────────├── partial / pending ──►
//!              -tolerance              0           +tolerance
//!
//!   balance >  tolerance and nothing confirmed  → pending
//!   balance >  tolerance and something confirmed → confirmed_partial
//!   |balance| <= tolerance                      → confirmed_total
//!   balance < -tolerance                        → credit
//! ```
//!
//! This is the only place the policy lives. Confirmation, cash registration
//! and the upload-time projection all call it.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CashPayment, PaymentStatus, Receipt, ReceiptStatus};
use crate::PAYMENT_TOLERANCE;

/// Resolves a payment status with the default tolerance.
pub fn resolve(order_total: Money, total_confirmed: Money) -> PaymentStatus {
    resolve_with_tolerance(order_total, total_confirmed, Money::from_pesos(PAYMENT_TOLERANCE))
}

/// Resolves a payment status with an explicit tolerance band.
///
/// ## Example
/// ```rust
/// use payproof_core::settlement::resolve_with_tolerance;
/// use payproof_core::{Money, PaymentStatus};
///
/// let tol = Money::from_pesos(1000);
/// let total = Money::from_pesos(30_000);
/// assert_eq!(resolve_with_tolerance(total, Money::from_pesos(29_000), tol), PaymentStatus::ConfirmedTotal);
/// assert_eq!(resolve_with_tolerance(total, Money::from_pesos(28_999), tol), PaymentStatus::ConfirmedPartial);
/// assert_eq!(resolve_with_tolerance(total, Money::zero(), tol), PaymentStatus::Pending);
/// assert_eq!(resolve_with_tolerance(total, Money::from_pesos(31_001), tol), PaymentStatus::Credit);
/// ```
pub fn resolve_with_tolerance(
    order_total: Money,
    total_confirmed: Money,
    tolerance: Money,
) -> PaymentStatus {
    let balance = order_total - total_confirmed;

    if balance.abs() <= tolerance {
        PaymentStatus::ConfirmedTotal
    } else if balance < -tolerance {
        PaymentStatus::Credit
    } else if total_confirmed.is_positive() {
        PaymentStatus::ConfirmedPartial
    } else {
        PaymentStatus::Pending
    }
}

/// Sums confirmed funds: confirmed receipts' detected amounts plus all cash.
///
/// Receipts without a detected amount contribute nothing. Cash payments are
/// always confirmed.
pub fn total_confirmed(receipts: &[Receipt], cash: &[CashPayment]) -> Money {
    let from_receipts: Money = receipts
        .iter()
        .filter(|r| r.status == ReceiptStatus::Confirmed)
        .filter_map(Receipt::detected)
        .sum();
    let from_cash: Money = cash.iter().map(CashPayment::amount).sum();
    from_receipts + from_cash
}

/// Derived payment fields of an order after a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Settlement {
    pub amount_paid: Money,
    /// Always `order_total - amount_paid`.
    pub balance: Money,
    pub status: PaymentStatus,
}

impl Settlement {
    /// Computes the settlement of an order from its total and confirmed funds.
    pub fn compute(order_total: Money, amount_paid: Money, tolerance: Money) -> Self {
        Settlement {
            amount_paid,
            balance: order_total - amount_paid,
            status: resolve_with_tolerance(order_total, amount_paid, tolerance),
        }
    }
}

//! # Lifecycle State Machines
//!
//! The receipt review machine and the order fulfillment machine.
//!
//! ## Receipt Review
//! ```text
//!                 ┌──── confirm ────► Confirmed (terminal)
//!   Pending ──────┤
//!                 └──── reject  ────► Rejected  (terminal)
//!
//!   Any decision on a terminal receipt → AlreadyProcessed
//! ```
//!
//! ## Fulfillment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  awaiting_payment ──► ready_to_print ──► packed ──┬──► picked_up        │
//! │         │                  │               │      └──► shipped ──►     │
//! │         │                  │               │                in_transit │
//! │         │             printed_at       packed_at      shipped_at       │
//! │         │             (set once)       (set once)     (set once)       │
//! │         │                                                               │
//! │  auto-advance on full payment              guard: shipped / in_transit │
//! │  (only from awaiting_payment)              require a fully paid order  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fulfillment is operator-driven: any known target may be requested, so an
//! operator can correct a mis-click. Only the payment guard is enforced, and
//! timestamps are never overwritten once set.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::types::{FulfillmentStatus, Order, PaymentStatus, ReceiptStatus};

// =============================================================================
// Receipt Review
// =============================================================================

/// An operator's (or rule's) verdict on a pending receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptDecision {
    Confirm,
    Reject,
}

impl ReceiptStatus {
    /// Applies a decision. None when the receipt is already terminal.
    pub const fn apply(self, decision: ReceiptDecision) -> Option<ReceiptStatus> {
        match (self, decision) {
            (ReceiptStatus::Pending, ReceiptDecision::Confirm) => Some(ReceiptStatus::Confirmed),
            (ReceiptStatus::Pending, ReceiptDecision::Reject) => Some(ReceiptStatus::Rejected),
            (ReceiptStatus::Confirmed, _) | (ReceiptStatus::Rejected, _) => None,
        }
    }
}

/// Applies a decision to a receipt, failing with `AlreadyProcessed`.
pub fn decide(
    receipt_id: &str,
    current: ReceiptStatus,
    decision: ReceiptDecision,
) -> CoreResult<ReceiptStatus> {
    current
        .apply(decision)
        .ok_or_else(|| CoreError::AlreadyProcessed {
            receipt_id: receipt_id.to_string(),
            status: current,
        })
}

// =============================================================================
// Fulfillment
// =============================================================================

/// New fulfillment fields for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillmentChange {
    pub status: FulfillmentStatus,
    pub printed_at: Option<DateTime<Utc>>,
    pub packed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
}

/// Computes the effect of moving `order` to `target` at `now`.
///
/// ## Errors
/// `PaymentIncomplete` when `target` is `shipped` or `in_transit` and the
/// order is not fully paid.
pub fn transition_fulfillment(
    order: &Order,
    target: FulfillmentStatus,
    now: DateTime<Utc>,
) -> CoreResult<FulfillmentChange> {
    if target.requires_full_payment() && !order.payment_status.is_fully_paid() {
        return Err(CoreError::PaymentIncomplete {
            order_number: order.order_number.clone(),
            payment_status: order.payment_status,
            target,
        });
    }

    let mut change = FulfillmentChange {
        status: target,
        printed_at: order.printed_at,
        packed_at: order.packed_at,
        shipped_at: order.shipped_at,
    };

    match target {
        FulfillmentStatus::AwaitingPayment => {}
        FulfillmentStatus::ReadyToPrint => {
            change.printed_at = change.printed_at.or(Some(now));
        }
        FulfillmentStatus::Packed => {
            change.packed_at = change.packed_at.or(Some(now));
        }
        FulfillmentStatus::PickedUp | FulfillmentStatus::Shipped | FulfillmentStatus::InTransit => {
            change.shipped_at = change.shipped_at.or(Some(now));
        }
    }

    Ok(change)
}

/// The automatic step taken when payment completes.
///
/// Only an order still waiting for payment moves, and only to
/// `ready_to_print`. Orders already further along are left alone.
pub fn auto_advance(
    current: FulfillmentStatus,
    payment: PaymentStatus,
) -> Option<FulfillmentStatus> {
    match current {
        FulfillmentStatus::AwaitingPayment if payment.is_fully_paid() => {
            Some(FulfillmentStatus::ReadyToPrint)
        }
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;
    use chrono::Duration;

    fn order(payment: PaymentStatus, fulfillment: FulfillmentStatus) -> Order {
        let now = Utc::now();
        Order {
            order_number: "1042".to_string(),
            total_amount: 30_000,
            amount_paid: 0,
            balance: 30_000,
            payment_status: payment,
            fulfillment_status: fulfillment,
            currency: Currency::Ars,
            customer_name: None,
            customer_email: None,
            customer_phone: None,
            printed_at: None,
            packed_at: None,
            shipped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_receipt_decisions() {
        assert_eq!(
            decide("r", ReceiptStatus::Pending, ReceiptDecision::Confirm).unwrap(),
            ReceiptStatus::Confirmed
        );
        assert_eq!(
            decide("r", ReceiptStatus::Pending, ReceiptDecision::Reject).unwrap(),
            ReceiptStatus::Rejected
        );
        for terminal in [ReceiptStatus::Confirmed, ReceiptStatus::Rejected] {
            for decision in [ReceiptDecision::Confirm, ReceiptDecision::Reject] {
                assert!(matches!(
                    decide("r", terminal, decision),
                    Err(CoreError::AlreadyProcessed { status, .. }) if status == terminal
                ));
            }
        }
    }

    #[test]
    fn test_shipping_requires_full_payment() {
        let o = order(PaymentStatus::ConfirmedPartial, FulfillmentStatus::Packed);
        for target in [FulfillmentStatus::Shipped, FulfillmentStatus::InTransit] {
            assert!(matches!(
                transition_fulfillment(&o, target, Utc::now()),
                Err(CoreError::PaymentIncomplete { .. })
            ));
        }

        // Picking up in store is not guarded
        let change = transition_fulfillment(&o, FulfillmentStatus::PickedUp, Utc::now()).unwrap();
        assert!(change.shipped_at.is_some());

        let paid = order(PaymentStatus::Credit, FulfillmentStatus::Packed);
        assert!(transition_fulfillment(&paid, FulfillmentStatus::Shipped, Utc::now()).is_ok());
    }

    #[test]
    fn test_timestamps_are_set_once() {
        let first = Utc::now();
        let later = first + Duration::hours(3);

        let mut o = order(PaymentStatus::ConfirmedTotal, FulfillmentStatus::AwaitingPayment);
        let change = transition_fulfillment(&o, FulfillmentStatus::ReadyToPrint, first).unwrap();
        assert_eq!(change.printed_at, Some(first));
        assert_eq!(change.packed_at, None);

        o.printed_at = change.printed_at;
        let again = transition_fulfillment(&o, FulfillmentStatus::ReadyToPrint, later).unwrap();
        assert_eq!(again.printed_at, Some(first));

        let shipped = transition_fulfillment(&o, FulfillmentStatus::Shipped, first).unwrap();
        o.shipped_at = shipped.shipped_at;
        let transit = transition_fulfillment(&o, FulfillmentStatus::InTransit, later).unwrap();
        assert_eq!(transit.shipped_at, Some(first));
        assert_eq!(transit.printed_at, Some(first));
    }

    #[test]
    fn test_auto_advance_only_from_awaiting_payment() {
        assert_eq!(
            auto_advance(FulfillmentStatus::AwaitingPayment, PaymentStatus::ConfirmedTotal),
            Some(FulfillmentStatus::ReadyToPrint)
        );
        assert_eq!(
            auto_advance(FulfillmentStatus::AwaitingPayment, PaymentStatus::ConfirmedPartial),
            None
        );
        assert_eq!(
            auto_advance(FulfillmentStatus::Packed, PaymentStatus::Credit),
            None
        );
    }
}

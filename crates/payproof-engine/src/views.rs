//! # Read Models
//!
//! Serializable snapshots returned by the engine's query operations.
//! Exported to TypeScript for the dashboard via ts-rs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use payproof_core::{CashPayment, LogEntry, Order, Receipt, ReceiptStatus};

/// An order with everything that was paid against it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderDetail {
    pub order: Order,
    /// Newest first.
    pub receipts: Vec<Receipt>,
    /// Newest first.
    pub cash_payments: Vec<CashPayment>,
    /// Audit entries of every receipt of the order, newest first.
    pub logs: Vec<LogEntry>,
}

/// A receipt with its audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptDetail {
    pub receipt: Receipt,
    pub logs: Vec<LogEntry>,
}

/// How a payment reached the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentChannel {
    /// Bank transfer proven by an uploaded receipt.
    Transfer,
    /// Cash recorded by an operator.
    Cash,
}

/// One line of an order's payment history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentHistoryEntry {
    /// Receipt or cash payment id.
    pub id: String,
    pub channel: PaymentChannel,
    /// Pesos. `None` for a receipt whose amount could not be read.
    pub amount: Option<i64>,
    /// Cash payments are always `confirmed`.
    pub status: ReceiptStatus,
    pub recorded_by: Option<String>,
    pub image_location: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl From<&Receipt> for PaymentHistoryEntry {
    fn from(receipt: &Receipt) -> Self {
        PaymentHistoryEntry {
            id: receipt.id.clone(),
            channel: PaymentChannel::Transfer,
            amount: receipt.detected_amount,
            status: receipt.status,
            recorded_by: None,
            image_location: receipt.image_location.clone(),
            created_at: receipt.created_at,
        }
    }
}

impl From<&CashPayment> for PaymentHistoryEntry {
    fn from(payment: &CashPayment) -> Self {
        PaymentHistoryEntry {
            id: payment.id.clone(),
            channel: PaymentChannel::Cash,
            amount: Some(payment.amount),
            status: ReceiptStatus::Confirmed,
            recorded_by: Some(payment.recorded_by.clone()),
            image_location: None,
            created_at: payment.created_at,
        }
    }
}

/// Merges receipts and cash payments into one list, newest first.
///
/// Entries with the same timestamp keep receipts before cash.
pub fn payment_history(receipts: &[Receipt], cash: &[CashPayment]) -> Vec<PaymentHistoryEntry> {
    let mut entries: Vec<PaymentHistoryEntry> = receipts
        .iter()
        .map(PaymentHistoryEntry::from)
        .chain(cash.iter().map(PaymentHistoryEntry::from))
        .collect();

    // stable sort keeps the input order on ties
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries
}

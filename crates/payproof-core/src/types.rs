//! # Domain Types
//!
//! Core domain types used throughout PayProof.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │    Receipt      │   │  CashPayment    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  order_number   │◄──│  order_number   │   │  order_number   │       │
//! │  │  total_amount   │   │  fingerprint    │   │  amount         │       │
//! │  │  amount_paid    │   │  detected_amount│   │  recorded_by    │       │
//! │  │  payment_status │   │  status         │   │  (immutable)    │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │                                       │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │ PaymentStatus   │   │    LogEntry     │   │     Lender      │       │
//! │  │ Fulfillment-    │   │  receipt_id     │   │  keywords       │       │
//! │  │   Status        │   │  action, actor  │   │  phone          │       │
//! │  │ ReceiptStatus   │   │  (append-only)  │   │                 │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! - Orders are keyed by the external order number (the store's own id).
//! - Receipts, cash payments, log entries and lenders use UUID v4 strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::{Currency, Money};
use crate::text::Fingerprint;

// =============================================================================
// Payment Status
// =============================================================================

/// How much of an order has been paid, as resolved from confirmed funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentStatus {
    /// Nothing confirmed yet.
    #[default]
    Pending,
    /// Some funds confirmed, balance still above the tolerance.
    ConfirmedPartial,
    /// Balance within the tolerance band.
    ConfirmedTotal,
    /// Over-paid beyond the tolerance band.
    Credit,
    /// An operator rejected a receipt for this order.
    Rejected,
}

impl PaymentStatus {
    /// Returns true when the order counts as fully paid.
    pub const fn is_fully_paid(&self) -> bool {
        matches!(self, PaymentStatus::ConfirmedTotal | PaymentStatus::Credit)
    }

    /// Stored and wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::ConfirmedPartial => "confirmed_partial",
            PaymentStatus::ConfirmedTotal => "confirmed_total",
            PaymentStatus::Credit => "credit",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Fulfillment Status
// =============================================================================

/// Physical handling stage of an order.
///
/// ```text
/// awaiting_payment ──► ready_to_print ──► packed ──┬──► picked_up
///                                                  └──► shipped ──► in_transit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum FulfillmentStatus {
    #[default]
    AwaitingPayment,
    ReadyToPrint,
    Packed,
    PickedUp,
    Shipped,
    InTransit,
}

impl FulfillmentStatus {
    /// All states, in workflow order.
    pub const ALL: [FulfillmentStatus; 6] = [
        FulfillmentStatus::AwaitingPayment,
        FulfillmentStatus::ReadyToPrint,
        FulfillmentStatus::Packed,
        FulfillmentStatus::PickedUp,
        FulfillmentStatus::Shipped,
        FulfillmentStatus::InTransit,
    ];

    /// Stored and wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::AwaitingPayment => "awaiting_payment",
            FulfillmentStatus::ReadyToPrint => "ready_to_print",
            FulfillmentStatus::Packed => "packed",
            FulfillmentStatus::PickedUp => "picked_up",
            FulfillmentStatus::Shipped => "shipped",
            FulfillmentStatus::InTransit => "in_transit",
        }
    }

    /// Returns true when entering this state requires a fully paid order.
    pub const fn requires_full_payment(&self) -> bool {
        matches!(self, FulfillmentStatus::Shipped | FulfillmentStatus::InTransit)
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FulfillmentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FulfillmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}

// =============================================================================
// Receipt Status
// =============================================================================

/// Review state of a submitted receipt. Confirmed and rejected are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ReceiptStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
}

impl ReceiptStatus {
    /// Stored and wire name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Pending => "pending",
            ReceiptStatus::Confirmed => "confirmed",
            ReceiptStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Actor
// =============================================================================

/// Who caused an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Actor {
    /// The buyer, uploading a receipt.
    Customer,
    /// A back-office operator reviewing receipts.
    Operator,
    /// An automated rule or background task.
    System,
}

impl Actor {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Actor::Customer => "customer",
            Actor::Operator => "operator",
            Actor::System => "system",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// An e-commerce order awaiting or holding payment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    /// External order number (unique).
    pub order_number: String,

    /// Authoritative total owed, in pesos. Sourced once, never recomputed.
    pub total_amount: i64,

    /// Confirmed receipts plus cash payments, recomputed on every event.
    pub amount_paid: i64,

    /// `total_amount - amount_paid`. Negative when over-paid.
    pub balance: i64,

    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub currency: Currency,

    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,

    /// First entry into `ready_to_print`.
    #[ts(as = "Option<String>")]
    pub printed_at: Option<DateTime<Utc>>,

    /// First entry into `packed`.
    #[ts(as = "Option<String>")]
    pub packed_at: Option<DateTime<Utc>>,

    /// First entry into `picked_up`, `shipped` or `in_transit`.
    #[ts(as = "Option<String>")]
    pub shipped_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_pesos(self.total_amount)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_pesos(self.amount_paid)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_pesos(self.balance)
    }
}

/// Customer contact data as supplied by the order source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// An order as reported by the external store.
///
/// Used to create the local [`Order`] on first sight and to fill in missing
/// customer data afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExternalOrder {
    pub order_number: String,
    pub total: Money,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub customer: Customer,
}

// =============================================================================
// Receipt
// =============================================================================

/// A submitted proof of transfer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Receipt {
    pub id: String,
    pub order_number: String,

    /// OCR output. Immutable once stored.
    pub raw_text: String,

    /// SHA-256 of the normalized text. Unique across all receipts.
    pub fingerprint: String,

    /// Amount picked by the extractor, if any.
    pub detected_amount: Option<i64>,

    /// Order total at ingestion time (audit snapshot).
    pub reference_order_total: i64,

    pub status: ReceiptStatus,

    /// Opaque object storage reference.
    pub image_location: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the receipt left `pending`.
    #[ts(as = "Option<String>")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Detected amount as Money.
    #[inline]
    pub fn detected(&self) -> Option<Money> {
        self.detected_amount.map(Money::from_pesos)
    }
}

/// Everything needed to persist a freshly ingested receipt.
#[derive(Debug, Clone)]
pub struct NewReceipt {
    pub order_number: String,
    pub raw_text: String,
    pub fingerprint: Fingerprint,
    pub detected_amount: Option<Money>,
    pub reference_order_total: Money,
    pub image_location: Option<String>,
}

// =============================================================================
// Cash Payment
// =============================================================================

/// A manually recorded payment. Always counted as confirmed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashPayment {
    pub id: String,
    pub order_number: String,
    /// Amount in pesos (> 0).
    pub amount: i64,
    pub recorded_by: String,
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashPayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_pesos(self.amount)
    }
}

// =============================================================================
// Audit Log
// =============================================================================

/// What happened to a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogAction {
    Created,
    Confirmed,
    Rejected { reason: Option<String> },
    /// A customer message was handed to the notifier. Records the dispatch,
    /// not the delivery: send failures only show up in the service logs.
    CustomerNotified,
    /// The receipt was handed to a lender's notifier. Dispatch, as above.
    LenderNotified,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogAction::Created => f.write_str("created"),
            LogAction::Confirmed => f.write_str("confirmed"),
            LogAction::Rejected { reason: Some(reason) } => write!(f, "rejected: {}", reason),
            LogAction::Rejected { reason: None } => f.write_str("rejected"),
            LogAction::CustomerNotified => f.write_str("customer_notified"),
            LogAction::LenderNotified => f.write_str("lender_notified"),
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LogEntry {
    pub id: String,
    pub receipt_id: String,
    /// Rendered [`LogAction`], e.g. `"rejected: amount does not match"`.
    pub action: String,
    pub actor: Actor,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Lender
// =============================================================================

/// A financing partner that reviews receipts mentioning it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Lender {
    pub id: String,
    pub name: String,
    pub phone: String,
    /// Comma-separated keywords, matched case-insensitively.
    pub keywords: String,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Lender {
    /// Trimmed, lower-cased, non-empty keywords.
    pub fn keyword_list(&self) -> Vec<String> {
        self.keywords
            .split(',')
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

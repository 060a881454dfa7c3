//! # Error Types
//!
//! Domain-specific error types for payproof-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  payproof-core errors (this file)                                      │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  payproof-db errors (separate crate)                                   │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  payproof-engine errors                                                │
//! │  └── EngineError      - Adds timeouts and external service failures    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError → caller   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is scoped to a single request and is user- or
//! operator-correctable. None of them is fatal to the process.

use thiserror::Error;

use crate::types::{FulfillmentStatus, PaymentStatus, ReceiptStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Order cannot be found.
    ///
    /// ## When This Occurs
    /// - Cash payment registered against an unknown order number
    /// - Fulfillment transition requested for an unknown order
    /// - Order source has no record of the order number
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Receipt cannot be found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(String),

    /// The same receipt text was already submitted.
    ///
    /// ## When This Occurs
    /// The normalized OCR text hashes to a fingerprint that another receipt
    /// (of any status, attached to any order) already owns.
    ///
    /// ## User Workflow
    /// ```text
    /// Customer uploads the same screenshot twice
    ///      │
    ///      ▼
    /// fingerprint(text) already stored
    ///      │
    ///      ▼
    /// DuplicateReceipt { existing_receipt_id: Some("...") }
    ///      │
    ///      ▼
    /// UI shows: "This receipt was already uploaded"
    /// ```
    #[error("Receipt already submitted (fingerprint {fingerprint})")]
    DuplicateReceipt {
        fingerprint: String,
        existing_receipt_id: Option<String>,
    },

    /// A receipt was confirmed or rejected a second time.
    ///
    /// ## When This Occurs
    /// - Two operators click "confirm" on the same receipt
    /// - An automated rule races an operator
    #[error("Receipt {receipt_id} was already processed (status: {status})")]
    AlreadyProcessed {
        receipt_id: String,
        status: ReceiptStatus,
    },

    /// Fulfillment guard violation: the order is not fully paid.
    ///
    /// ## When This Occurs
    /// Requesting `shipped` or `in_transit` while the payment status is
    /// anything other than `confirmed_total` or `credit`.
    #[error("Order {order_number} cannot move to {target}: payment is {payment_status}")]
    PaymentIncomplete {
        order_number: String,
        payment_status: PaymentStatus,
        target: FulfillmentStatus,
    },

    /// Unknown status name in a transition request.
    #[error("Invalid status: '{0}'")]
    InvalidStatus(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// OCR text does not plausibly come from a payment receipt.
    #[error("Not a payment receipt: {reason}")]
    NotAReceipt { reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

//! # payproof-core: Pure Business Logic for PayProof
//!
//! This crate holds every rule of receipt reconciliation as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PayProof Data Flow                               │
//! │                                                                         │
//! │  Receipt image ──► OCR (external) ──► raw text                         │
//! │                                          │                              │
//! │  ┌───────────────────────────────────────▼─────────────────────────┐   │
//! │  │               ★ payproof-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐               │   │
//! │  │   │ validation │─►│    text    │─►│  extract   │               │   │
//! │  │   │ is it a    │  │ normalize  │  │ score the  │               │   │
//! │  │   │ receipt?   │  │ fingerprint│  │ amounts    │               │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘               │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐               │   │
//! │  │   │ settlement │─►│ lifecycle  │  │   lender   │               │   │
//! │  │   │ sum+resolve│  │ receipt &  │  │  keyword   │               │   │
//! │  │   │ tolerance  │  │ fulfillment│  │  routing   │               │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘               │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              payproof-db (atomic units of work)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Receipt, CashPayment, LogEntry, ...)
//! - [`money`] - Whole-peso money type with Argentine formatting
//! - [`error`] - Domain error types
//! - [`text`] - Text normalizer and SHA-256 fingerprint
//! - [`validation`] - Receipt plausibility and input checks
//! - [`extract`] - Heuristic amount extractor
//! - [`settlement`] - Payment aggregation and status resolution
//! - [`lifecycle`] - Receipt and fulfillment state machines
//! - [`lender`] - Keyword routing of receipts to financing partners
//!
//! ## Example Usage
//!
//! ```rust
//! use payproof_core::extract::extract;
//! use payproof_core::settlement::resolve;
//! use payproof_core::{Money, PaymentStatus};
//!
//! let text = "Transferencia exitosa. Importe: $ 50.500,00. CBU 000000031000";
//! let found = extract(text);
//! assert_eq!(found.amount, Some(Money::from_pesos(50_500)));
//!
//! let status = resolve(Money::from_pesos(50_000), Money::from_pesos(50_500));
//! assert_eq!(status, PaymentStatus::ConfirmedTotal);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod extract;
pub mod lender;
pub mod lifecycle;
pub mod money;
pub mod settlement;
pub mod text;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, Money};
pub use text::Fingerprint;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Margin (in pesos) within which a balance counts as fully settled.
///
/// ## Business Reason
/// Bank transfer fees and rounding by the payer routinely leave a few
/// hundred pesos of difference against the order total.
pub const PAYMENT_TOLERANCE: i64 = 1000;

/// Smallest amount the extractor accepts as a candidate.
///
/// Anything below this is almost always an operation or reference number.
pub const MIN_PLAUSIBLE_AMOUNT: i64 = 1000;

/// Minimum length of normalized OCR text for it to count as a receipt.
pub const MIN_RECEIPT_TEXT_LEN: usize = 30;

/// Characters of context on each side of an amount candidate used for scoring.
pub const CONTEXT_WINDOW: usize = 50;

/// Maximum length of an external order number.
pub const MAX_ORDER_NUMBER_LEN: usize = 64;

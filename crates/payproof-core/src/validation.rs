//! # Validation Module
//!
//! Input validation utilities for PayProof.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE                                                  │
//! │  ├── Is the OCR text plausibly a bank receipt?                         │
//! │  └── Order numbers and cash amounts well-formed?                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Amount extraction + operator review                          │
//! │  └── The real gate for what counts as paid                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE fingerprint                                                │
//! │  └── CHECK (amount > 0), foreign keys                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::text::normalize;
use crate::{MAX_ORDER_NUMBER_LEN, MIN_RECEIPT_TEXT_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Bank and transfer vocabulary. One hit is enough.
pub const RECEIPT_KEYWORDS: [&str; 11] = [
    "transferencia",
    "comprobante",
    "pago",
    "importe",
    "total",
    "fecha",
    "operacion",
    "referencia",
    "cbu",
    "cvu",
    "alias",
];

// =============================================================================
// Receipt Text
// =============================================================================

/// Rejects OCR text that does not look like a payment receipt.
///
/// ## Rules
/// - Normalized text must be at least 30 characters
/// - At least one of [`RECEIPT_KEYWORDS`] must appear (substring match)
///
/// ## Example
/// ```rust
/// use payproof_core::validation::validate_receipt_text;
///
/// assert!(validate_receipt_text("Comprobante de transferencia N 123456").is_ok());
/// assert!(validate_receipt_text("hola").is_err());
/// ```
pub fn validate_receipt_text(raw_text: &str) -> ValidationResult<()> {
    let text = normalize(raw_text);

    if text.chars().count() < MIN_RECEIPT_TEXT_LEN {
        return Err(ValidationError::NotAReceipt {
            reason: format!("text shorter than {} characters", MIN_RECEIPT_TEXT_LEN),
        });
    }

    if !RECEIPT_KEYWORDS.iter().any(|kw| text.contains(kw)) {
        return Err(ValidationError::NotAReceipt {
            reason: "no payment vocabulary found".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Identifiers & Amounts
// =============================================================================

/// Validates an external order number.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - No whitespace or control characters
pub fn validate_order_number(order_number: &str) -> ValidationResult<()> {
    if order_number.is_empty() {
        return Err(ValidationError::Required {
            field: "order_number".to_string(),
        });
    }

    if order_number.chars().count() > MAX_ORDER_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "order_number".to_string(),
            max: MAX_ORDER_NUMBER_LEN,
        });
    }

    if order_number
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::InvalidFormat {
            field: "order_number".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Validates a cash payment amount in pesos.
pub fn validate_cash_amount(pesos: i64) -> ValidationResult<()> {
    if pesos <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a rejection reason, returning it trimmed (or None when blank).
pub fn validate_reason(reason: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if reason.chars().count() > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }

    Ok(Some(reason.to_string()))
}

// =============================================================================
// Unit Tests
// =============================================================================

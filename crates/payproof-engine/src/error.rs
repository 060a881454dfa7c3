//! # Engine Error Types
//!
//! Error types for reconciliation operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Engine Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Domain (Core)  │  │   External      │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  External       │  │  InvalidConfig          │ │
//! │  │  Duplicate      │  │  Timeout        │  │  ConfigLoadFailed       │ │
//! │  │  NotFound       │  │                 │  │  ConfigSaveFailed       │ │
//! │  │  AlreadyProc.   │  │  (retryable)    │  │                         │ │
//! │  │  PaymentIncompl.│  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                   │
//! │  │    Database     │  DbError::Domain(..) is unwrapped back into       │
//! │  │  (infra only)   │  Core(..) so callers match one variant per rule.  │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use payproof_core::CoreError;
use payproof_db::DbError;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error type covering every failure a caller can observe.
#[derive(Debug, Error)]
pub enum EngineError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A business rule rejected the request.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Database failure unrelated to a business rule.
    #[error("Database error: {0}")]
    Database(DbError),

    /// A collaborator (OCR, storage, messaging, store API) failed.
    ///
    /// ## When This Occurs
    /// - OCR service returned an error
    /// - Image upload was refused
    /// - Store API unreachable
    #[error("{service} failed: {reason}")]
    External { service: String, reason: String },

    /// A collaborator did not answer within the configured timeout.
    #[error("{service} timed out after {secs} seconds")]
    Timeout { service: String, secs: u64 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => EngineError::Core(core),
            other => EngineError::Database(other),
        }
    }
}

impl From<payproof_core::ValidationError> for EngineError {
    fn from(err: payproof_core::ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl EngineError {
    /// Creates an External error for a named collaborator.
    pub fn external(service: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::External {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if the caller may retry the same request.
    ///
    /// ## Retryable Errors
    /// - Collaborator failures and timeouts
    /// - Exhausted or unreachable database pool
    ///
    /// ## Non-Retryable Errors
    /// - Every domain rule (retrying gives the same answer)
    /// - Configuration errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::External { .. }
                | EngineError::Timeout { .. }
                | EngineError::Database(DbError::PoolExhausted)
                | EngineError::Database(DbError::ConnectionFailed(_))
                | EngineError::Database(DbError::Busy(_))
        )
    }

    /// Returns true if the customer or operator can fix the request.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            EngineError::Core(CoreError::Validation(_))
                | EngineError::Core(CoreError::DuplicateReceipt { .. })
                | EngineError::Core(CoreError::InvalidStatus(_))
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidConfig(_)
                | EngineError::ConfigLoadFailed(_)
                | EngineError::ConfigSaveFailed(_)
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Core(core) => match core {
                CoreError::Validation(_) => "validation",
                CoreError::DuplicateReceipt { .. } => "duplicate",
                CoreError::OrderNotFound(_) | CoreError::ReceiptNotFound(_) => "not_found",
                CoreError::AlreadyProcessed { .. } => "already_processed",
                CoreError::PaymentIncomplete { .. } => "invalid_transition",
                CoreError::InvalidStatus(_) => "invalid_status",
            },
            EngineError::External { .. } | EngineError::Timeout { .. } => "transient_external",
            EngineError::Database(_) => "database",
            EngineError::InvalidConfig(_)
            | EngineError::ConfigLoadFailed(_)
            | EngineError::ConfigSaveFailed(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payproof_core::{ReceiptStatus, ValidationError};

    #[test]
    fn test_domain_errors_are_unwrapped_from_db() {
        let err: EngineError = DbError::Domain(CoreError::ReceiptNotFound("r-1".into())).into();
        assert!(matches!(err, EngineError::Core(CoreError::ReceiptNotFound(_))));
        assert_eq!(err.code(), "not_found");

        let err: EngineError = DbError::PoolExhausted.into();
        assert!(matches!(err, EngineError::Database(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::external("ocr", "503").is_retryable());
        assert!(EngineError::Timeout {
            service: "storage".into(),
            secs: 5
        }
        .is_retryable());

        let processed = EngineError::Core(CoreError::AlreadyProcessed {
            receipt_id: "r-1".into(),
            status: ReceiptStatus::Confirmed,
        });
        assert!(!processed.is_retryable());
        assert!(!EngineError::InvalidConfig("bad".into()).is_retryable());

        let locked: EngineError = DbError::Busy("database is locked".into()).into();
        assert!(locked.is_retryable());
        assert_eq!(locked.code(), "database");
    }

    #[test]
    fn test_user_correctable_errors() {
        let not_receipt: EngineError = ValidationError::NotAReceipt {
            reason: "no keywords".into(),
        }
        .into();
        assert!(not_receipt.is_user_correctable());
        assert_eq!(not_receipt.code(), "validation");

        let duplicate = EngineError::Core(CoreError::DuplicateReceipt {
            fingerprint: "abc".into(),
            existing_receipt_id: None,
        });
        assert!(duplicate.is_user_correctable());
        assert_eq!(duplicate.code(), "duplicate");

        assert!(!EngineError::external("ocr", "down").is_user_correctable());
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::Timeout {
            service: "ocr".into(),
            secs: 5,
        };
        assert_eq!(err.to_string(), "ocr timed out after 5 seconds");
        assert_eq!(err.code(), "transient_external");
    }
}

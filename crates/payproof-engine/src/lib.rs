//! # payproof-engine: Reconciliation Service for PayProof
//!
//! Orchestrates receipt ingestion, operator decisions, cash payments and
//! fulfillment on top of `payproof-core` rules and `payproof-db` storage.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        payproof-engine                                  │
//! │                                                                         │
//! │  caller (HTTP handler, webhook, CLI)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  ReconciliationEngine                            │   │
//! │  │  ingest_receipt   confirm_receipt   register_cash_payment        │   │
//! │  │  sync_order       reject_receipt    transition_fulfillment       │   │
//! │  └──────┬──────────────────┬───────────────────────┬───────────────┘   │
//! │         │                  │                       │                    │
//! │         ▼                  ▼                       ▼                    │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────────────┐    │
//! │  │   ports     │   │ payproof-db  │   │ NotificationDispatcher   │    │
//! │  │ OCR, store, │   │ atomic units │   │ spawned, fire-and-forget │    │
//! │  │ storage     │   │ of work      │   │                          │    │
//! │  └─────────────┘   └──────────────┘   └──────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! use payproof_db::Database;
//! use payproof_engine::{EngineConfig, ReconciliationEngineBuilder};
//!
//! let config = EngineConfig::load_or_default(None);
//! let db = Database::new(config.db_config()).await?;
//!
//! let engine = ReconciliationEngineBuilder::new(config)
//!     .with_database(db)
//!     .with_order_source(store_client)
//!     .with_ocr(ocr_client)
//!     .with_storage(bucket)
//!     .with_notifier(whatsapp)
//!     .build()?;
//!
//! let outcome = engine.ingest_receipt("1001", &image_bytes, "comprobante.jpg").await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod ports;
pub mod views;

#[cfg(test)]
mod testing;

pub use config::EngineConfig;
pub use engine::{IngestOutcome, ReconciliationEngine, ReconciliationEngineBuilder};
pub use error::{EngineError, EngineResult};
pub use ports::{NoOpNotifier, Notifier, ObjectStorage, OcrProvider, OrderSource, PortError, PortResult};
pub use views::{OrderDetail, PaymentChannel, PaymentHistoryEntry, ReceiptDetail};

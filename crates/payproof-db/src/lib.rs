//! # payproof-db: Database Layer for PayProof
//!
//! This crate provides database access for the reconciliation engine.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PayProof Data Flow                               │
//! │                                                                         │
//! │  ReconciliationEngine (payproof-engine)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   payproof-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ OrderRepo     │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ ReceiptRepo   │    │   _schema    │  │   │
//! │  │   │ WAL, FKs on   │    │ PaymentRepo   │    │              │  │   │
//! │  │   │               │    │ LogRepo       │    │              │  │   │
//! │  │   │               │    │ LenderRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use payproof_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("payproof.db")).await?;
//!
//! let order = db.orders().get("1042").await?;
//! let outcome = db.receipts().confirm(&receipt_id, Actor::Operator, tolerance).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::lender::LenderRepository;
pub use repository::log::ReceiptLogRepository;
pub use repository::order::{FulfillmentOutcome, OrderRepository};
pub use repository::payment::{CashOutcome, PaymentRepository};
pub use repository::receipt::{ConfirmOutcome, ReceiptRepository, RejectOutcome};

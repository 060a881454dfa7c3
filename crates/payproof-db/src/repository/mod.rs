//! # Repository Module
//!
//! Database repository implementations for PayProof.
//!
//! ## Units of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Payment-affecting transactions                         │
//! │                                                                         │
//! │  confirm(receipt)          record_cash(order)        reject(receipt)   │
//! │       │                          │                         │           │
//! │       ▼                          ▼                         ▼           │
//! │  CAS pending→confirmed      touch order row          CAS pending→      │
//! │  (takes the write lock)     (takes the write lock)   rejected          │
//! │       │                          │                         │           │
//! │       ▼                          ▼                         ▼           │
//! │  touch order row            insert cash row          order.payment_    │
//! │       │                          │                   status=rejected   │
//! │       └────────────┬─────────────┘                         │           │
//! │                    ▼                                       │           │
//! │     settle: SUM confirmed funds → resolve → auto-advance   │           │
//! │                    │                                       │           │
//! │                    ▼                                       ▼           │
//! │             append audit log ──────────────────────► COMMIT            │
//! │                                                                         │
//! │  The first statement of every transaction is a write, so SQLite's      │
//! │  single writer lock serializes recompute-then-write per database.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`order::OrderRepository`] - Order upsert, lookup and fulfillment
//! - [`receipt::ReceiptRepository`] - Receipt ingestion and review
//! - [`payment::PaymentRepository`] - Cash payments and funds totals
//! - [`log::ReceiptLogRepository`] - Append-only receipt audit trail
//! - [`lender::LenderRepository`] - Financing partners

pub mod lender;
pub mod log;
pub mod order;
pub mod payment;
pub mod receipt;

//! # Receipt Repository
//!
//! Storage and review of submitted receipts.
//!
//! ## Receipt Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Receipt Lifecycle                                 │
//! │                                                                         │
//! │  1. INSERT                                                             │
//! │     └── insert() → Receipt { status: Pending } + log "created"         │
//! │     └── UNIQUE(fingerprint) violation → DuplicateReceipt               │
//! │                                                                         │
//! │  2a. CONFIRM                                                           │
//! │     └── UPDATE ... WHERE status = 'pending'  (compare-and-set)         │
//! │     └── settle order (recompute, resolve, auto-advance)                │
//! │     └── log "confirmed"                                                │
//! │                                                                         │
//! │  2b. REJECT                                                            │
//! │     └── UPDATE ... WHERE status = 'pending'  (compare-and-set)         │
//! │     └── order.payment_status = rejected (no recompute)                 │
//! │     └── log "rejected[: reason]"                                       │
//! │                                                                         │
//! │  Zero rows from the compare-and-set → AlreadyProcessed / NotFound.     │
//! │  Each step list runs in one transaction.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{log, order};
use payproof_core::lifecycle::{decide, ReceiptDecision};
use payproof_core::{
    Actor, CoreError, LogAction, Money, NewReceipt, Order, PaymentStatus, Receipt, ReceiptStatus,
};

/// Result of confirming a receipt.
#[derive(Debug, Clone)]
pub struct ConfirmOutcome {
    pub receipt: Receipt,
    pub order: Order,
    /// True when this confirmation moved the order to `ready_to_print`.
    pub advanced: bool,
}

/// Result of rejecting a receipt.
#[derive(Debug, Clone)]
pub struct RejectOutcome {
    pub receipt: Receipt,
    pub order: Order,
}

/// Repository for receipt database operations.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    pool: SqlitePool,
}

impl ReceiptRepository {
    /// Creates a new ReceiptRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptRepository { pool }
    }

    /// Stores a pending receipt and its `created` log entry.
    ///
    /// ## Errors
    /// - `DuplicateReceipt` when the fingerprint is already stored, for any
    ///   order. The unique index decides, so concurrent uploads of the same
    ///   text cannot both succeed.
    /// - `OrderNotFound` when the order doesn't exist
    pub async fn insert(&self, new: &NewReceipt, actor: Actor) -> DbResult<Receipt> {
        let now = Utc::now();
        let receipt = Receipt {
            id: Uuid::new_v4().to_string(),
            order_number: new.order_number.clone(),
            raw_text: new.raw_text.clone(),
            fingerprint: new.fingerprint.as_str().to_string(),
            detected_amount: new.detected_amount.map(|m| m.pesos()),
            reference_order_total: new.reference_order_total.pesos(),
            status: ReceiptStatus::Pending,
            image_location: new.image_location.clone(),
            created_at: now,
            decided_at: None,
        };

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO receipts (
                id, order_number, raw_text, fingerprint,
                detected_amount, reference_order_total, status,
                image_location, created_at, decided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, NULL)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.order_number)
        .bind(&receipt.raw_text)
        .bind(&receipt.fingerprint)
        .bind(receipt.detected_amount)
        .bind(receipt.reference_order_total)
        .bind(receipt.status)
        .bind(&receipt.image_location)
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            tx.rollback().await?;
            return Err(self.classify_insert_error(err.into(), new).await);
        }

        log::append(&mut *tx, &receipt.id, &LogAction::Created, actor, now).await?;
        tx.commit().await?;

        info!(
            receipt_id = %receipt.id,
            order_number = %receipt.order_number,
            detected_amount = ?receipt.detected_amount,
            "Receipt stored"
        );

        Ok(receipt)
    }

    async fn classify_insert_error(&self, err: DbError, new: &NewReceipt) -> DbError {
        match err {
            err if err.is_unique_violation_on("receipts.fingerprint") => {
                let existing = self
                    .find_by_fingerprint(new.fingerprint.as_str())
                    .await
                    .ok()
                    .flatten()
                    .map(|r| r.id);
                warn!(
                    order_number = %new.order_number,
                    existing_receipt_id = ?existing,
                    "Duplicate receipt submitted"
                );
                CoreError::DuplicateReceipt {
                    fingerprint: new.fingerprint.to_string(),
                    existing_receipt_id: existing,
                }
                .into()
            }
            DbError::ForeignKeyViolation { .. } => {
                CoreError::OrderNotFound(new.order_number.clone()).into()
            }
            other => other,
        }
    }

    /// Gets a receipt by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<Receipt>> {
        fetch(&self.pool, id).await
    }

    /// Gets a receipt, failing with `ReceiptNotFound`.
    pub async fn get_required(&self, id: &str) -> DbResult<Receipt> {
        self.get(id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(id.to_string()).into())
    }

    /// Looks up a receipt by the fingerprint of its normalized text.
    pub async fn find_by_fingerprint(&self, fingerprint: &str) -> DbResult<Option<Receipt>> {
        let receipt =
            sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE fingerprint = ?1")
                .bind(fingerprint)
                .fetch_optional(&self.pool)
                .await?;
        Ok(receipt)
    }

    /// Lists receipts of an order, newest first.
    pub async fn list_for_order(&self, order_number: &str) -> DbResult<Vec<Receipt>> {
        let receipts = sqlx::query_as::<_, Receipt>(
            r#"
            SELECT * FROM receipts
            WHERE order_number = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(order_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }

    /// Confirms a pending receipt and settles its order.
    ///
    /// ## Atomicity
    /// The status change, the recomputed order fields, the optional
    /// auto-advance to `ready_to_print` and the log entry commit together.
    /// Of two concurrent confirmations exactly one succeeds; the other sees
    /// `AlreadyProcessed` and the amount is counted once.
    pub async fn confirm(
        &self,
        id: &str,
        actor: Actor,
        tolerance: Money,
    ) -> DbResult<ConfirmOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        transition(&mut tx, id, ReceiptDecision::Confirm, now).await?;

        let receipt = fetch(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(id.to_string()))?;

        order::lock(&mut tx, &receipt.order_number, now).await?;
        let settled = order::settle(&mut tx, &receipt.order_number, tolerance, now).await?;

        log::append(&mut *tx, id, &LogAction::Confirmed, actor, now).await?;
        tx.commit().await?;

        info!(
            receipt_id = %id,
            order_number = %receipt.order_number,
            amount_paid = settled.order.amount_paid,
            balance = settled.order.balance,
            status = %settled.order.payment_status,
            "Receipt confirmed"
        );

        Ok(ConfirmOutcome {
            receipt,
            order: settled.order,
            advanced: settled.advanced,
        })
    }

    /// Rejects a pending receipt and flags its order as `rejected`.
    ///
    /// The order's funds are not recomputed: a rejection flags the whole
    /// order even when other receipts stay confirmed. The next confirmation
    /// or cash payment recomputes and replaces the flag.
    pub async fn reject(
        &self,
        id: &str,
        reason: Option<String>,
        actor: Actor,
    ) -> DbResult<RejectOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        transition(&mut tx, id, ReceiptDecision::Reject, now).await?;

        let receipt = fetch(&mut *tx, id)
            .await?
            .ok_or_else(|| CoreError::ReceiptNotFound(id.to_string()))?;

        sqlx::query(
            "UPDATE orders SET payment_status = ?1, updated_at = ?2 WHERE order_number = ?3",
        )
        .bind(PaymentStatus::Rejected)
        .bind(now)
        .bind(&receipt.order_number)
        .execute(&mut *tx)
        .await?;

        let order = order::fetch(&mut *tx, &receipt.order_number)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(receipt.order_number.clone()))?;

        log::append(&mut *tx, id, &LogAction::Rejected { reason }, actor, now).await?;
        tx.commit().await?;

        info!(
            receipt_id = %id,
            order_number = %receipt.order_number,
            "Receipt rejected"
        );

        Ok(RejectOutcome { receipt, order })
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

async fn fetch<'e, E>(executor: E, id: &str) -> DbResult<Option<Receipt>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let receipt = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = ?1")
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(receipt)
}

/// Compare-and-set from `pending` to the decision's target status.
async fn transition(
    conn: &mut SqliteConnection,
    id: &str,
    decision: ReceiptDecision,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let target = ReceiptStatus::Pending
        .apply(decision)
        .ok_or_else(|| DbError::Internal("pending receipt cannot be decided".to_string()))?;

    let changed = sqlx::query(
        "UPDATE receipts SET status = ?1, decided_at = ?2 WHERE id = ?3 AND status = 'pending'",
    )
    .bind(target)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if changed == 1 {
        return Ok(());
    }

    let current: Option<ReceiptStatus> =
        sqlx::query_scalar("SELECT status FROM receipts WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    debug!(receipt_id = %id, current = ?current, "Receipt transition refused");

    match current {
        None => Err(CoreError::ReceiptNotFound(id.to_string()).into()),
        Some(status) => match decide(id, status, decision) {
            Err(err) => Err(err.into()),
            Ok(_) => Err(DbError::Internal(format!(
                "receipt {} changed status during transition",
                id
            ))),
        },
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Payment Repository
//!
//! Cash payments and the confirmed-funds totals every recomputation uses.
//!
//! ## Funds Aggregation
//! ```text
//! amount_paid = SUM(receipts.detected_amount  WHERE status = 'confirmed')
//!             + SUM(cash_payments.amount)
//! ```
//! Receipts without a detected amount contribute nothing. Cash rows are
//! immutable and always count.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::order;
use payproof_core::{CashPayment, Money, Order};

/// Result of registering a cash payment.
#[derive(Debug, Clone)]
pub struct CashOutcome {
    pub payment: CashPayment,
    pub order: Order,
    /// True when this payment moved the order to `ready_to_print`.
    pub advanced: bool,
}

/// Repository for cash payments and funds totals.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a cash payment and settles the order in one transaction.
    ///
    /// ## Errors
    /// `OrderNotFound` when the order doesn't exist. Nothing is written.
    pub async fn record_cash(
        &self,
        order_number: &str,
        amount: Money,
        recorded_by: &str,
        note: Option<&str>,
        tolerance: Money,
    ) -> DbResult<CashOutcome> {
        let now = Utc::now();
        let payment = CashPayment {
            id: Uuid::new_v4().to_string(),
            order_number: order_number.to_string(),
            amount: amount.pesos(),
            recorded_by: recorded_by.to_string(),
            note: note.map(str::to_string),
            created_at: now,
        };

        let mut tx = self.pool.begin().await?;

        order::lock(&mut tx, order_number, now).await?;

        sqlx::query(
            r#"
            INSERT INTO cash_payments (id, order_number, amount, recorded_by, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.order_number)
        .bind(payment.amount)
        .bind(&payment.recorded_by)
        .bind(&payment.note)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;

        let settled = order::settle(&mut tx, order_number, tolerance, now).await?;

        tx.commit().await?;

        info!(
            order_number = %order_number,
            amount = %amount,
            recorded_by = %recorded_by,
            status = %settled.order.payment_status,
            "Cash payment recorded"
        );

        Ok(CashOutcome {
            payment,
            order: settled.order,
            advanced: settled.advanced,
        })
    }

    /// Lists cash payments of an order, newest first.
    pub async fn list_for_order(&self, order_number: &str) -> DbResult<Vec<CashPayment>> {
        let payments = sqlx::query_as::<_, CashPayment>(
            r#"
            SELECT * FROM cash_payments
            WHERE order_number = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(order_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Confirmed receipts plus cash for an order.
    pub async fn total_confirmed(&self, order_number: &str) -> DbResult<Money> {
        sum_confirmed(&self.pool, order_number).await
    }

    /// Confirmed funds plus the detected amounts of still-pending receipts.
    ///
    /// Used to tell a customer what their balance will be once the receipts
    /// they sent are reviewed. Rejected receipts are excluded.
    pub async fn projected_total(&self, order_number: &str) -> DbResult<Money> {
        let pesos: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COALESCE(SUM(detected_amount), 0) FROM receipts
                  WHERE order_number = ?1 AND status IN ('confirmed', 'pending'))
              + (SELECT COALESCE(SUM(amount), 0) FROM cash_payments
                  WHERE order_number = ?1)
            "#,
        )
        .bind(order_number)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_pesos(pesos))
    }
}

pub(crate) async fn sum_confirmed<'e, E>(executor: E, order_number: &str) -> DbResult<Money>
where
    E: Executor<'e, Database = Sqlite>,
{
    let pesos: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COALESCE(SUM(detected_amount), 0) FROM receipts
              WHERE order_number = ?1 AND status = 'confirmed')
          + (SELECT COALESCE(SUM(amount), 0) FROM cash_payments
              WHERE order_number = ?1)
        "#,
    )
    .bind(order_number)
    .fetch_one(executor)
    .await?;

    Ok(Money::from_pesos(pesos))
}

// =============================================================================
// Unit Tests
// =============================================================================

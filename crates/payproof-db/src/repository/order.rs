//! # Order Repository
//!
//! Orders are created from the external store's record and afterwards only
//! their derived fields change.
//!
//! ## Field Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Field                       Written by                                 │
//! │  ─────────────────────────   ────────────────────────────────────────   │
//! │  total_amount, currency      upsert (first insert only)                 │
//! │  customer_*                  upsert (fill-if-absent)                    │
//! │  amount_paid, balance,       settle (inside confirm / record_cash)      │
//! │  payment_status              reject (payment_status only)               │
//! │  fulfillment_status,         transition_fulfillment, settle            │
//! │  printed/packed/shipped_at   (auto-advance)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;
use crate::repository::payment;
use payproof_core::lifecycle::{auto_advance, transition_fulfillment, FulfillmentChange};
use payproof_core::settlement::Settlement;
use payproof_core::{CoreError, ExternalOrder, FulfillmentStatus, Money, Order, PaymentStatus};

/// Result of a fulfillment transition.
#[derive(Debug, Clone)]
pub struct FulfillmentOutcome {
    pub order: Order,
    pub previous: FulfillmentStatus,
}

/// Order state after a recomputation inside a transaction.
#[derive(Debug, Clone)]
pub(crate) struct Settled {
    pub order: Order,
    /// True when full payment moved the order to `ready_to_print`.
    pub advanced: bool,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates the order on first sight, otherwise fills missing customer data.
    ///
    /// ## Idempotency
    /// Total, currency and the initial statuses are only written by the
    /// first insert. Calling this again with a different total leaves the
    /// stored total untouched: the first sync is authoritative.
    pub async fn upsert(&self, external: &ExternalOrder) -> DbResult<Order> {
        let now = Utc::now();
        debug!(
            order_number = %external.order_number,
            total = %external.total,
            "Upserting order"
        );

        sqlx::query(
            r#"
            INSERT INTO orders (
                order_number, total_amount, amount_paid, balance,
                payment_status, fulfillment_status, currency,
                customer_name, customer_email, customer_phone,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, 0, ?2,
                ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?9
            )
            ON CONFLICT (order_number) DO UPDATE SET
                customer_name  = COALESCE(NULLIF(orders.customer_name, ''), excluded.customer_name),
                customer_email = COALESCE(NULLIF(orders.customer_email, ''), excluded.customer_email),
                customer_phone = COALESCE(NULLIF(orders.customer_phone, ''), excluded.customer_phone),
                updated_at     = excluded.updated_at
            "#,
        )
        .bind(&external.order_number)
        .bind(external.total.pesos())
        .bind(PaymentStatus::Pending)
        .bind(FulfillmentStatus::AwaitingPayment)
        .bind(external.currency)
        .bind(&external.customer.name)
        .bind(&external.customer.email)
        .bind(&external.customer.phone)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_required(&external.order_number).await
    }

    /// Gets an order by its external number.
    pub async fn get(&self, order_number: &str) -> DbResult<Option<Order>> {
        fetch(&self.pool, order_number).await
    }

    /// Gets an order, failing with `OrderNotFound`.
    pub async fn get_required(&self, order_number: &str) -> DbResult<Order> {
        self.get(order_number)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_number.to_string()).into())
    }

    /// Number of stored orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Moves an order to `target`, stamping the matching timestamp once.
    ///
    /// ## Errors
    /// - `OrderNotFound` for an unknown order
    /// - `PaymentIncomplete` when shipping an order that is not fully paid;
    ///   nothing is written in that case
    pub async fn transition_fulfillment(
        &self,
        order_number: &str,
        target: FulfillmentStatus,
    ) -> DbResult<FulfillmentOutcome> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        lock(&mut tx, order_number, now).await?;
        let mut order = fetch(&mut *tx, order_number)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_number.to_string()))?;

        let previous = order.fulfillment_status;
        let change = transition_fulfillment(&order, target, now)?;
        apply_change(&mut order, change);
        order.updated_at = now;
        write_state(&mut tx, &order).await?;

        tx.commit().await?;

        info!(
            order_number = %order_number,
            from = %previous,
            to = %target,
            "Fulfillment status changed"
        );

        Ok(FulfillmentOutcome { order, previous })
    }
}

// =============================================================================
// Transaction helpers
// =============================================================================

pub(crate) async fn fetch<'e, E>(executor: E, order_number: &str) -> DbResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = ?1")
        .bind(order_number)
        .fetch_optional(executor)
        .await?;
    Ok(order)
}

/// Writes the order row first so the transaction owns SQLite's write lock
/// before anything is read.
///
/// ## Errors
/// `OrderNotFound` when no row matches.
pub(crate) async fn lock(
    conn: &mut SqliteConnection,
    order_number: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let touched = sqlx::query("UPDATE orders SET updated_at = ?1 WHERE order_number = ?2")
        .bind(now)
        .bind(order_number)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if touched == 0 {
        return Err(CoreError::OrderNotFound(order_number.to_string()).into());
    }
    Ok(())
}

/// Recomputes confirmed funds from source rows and persists the result.
///
/// Must run inside a transaction that already holds the write lock.
pub(crate) async fn settle(
    conn: &mut SqliteConnection,
    order_number: &str,
    tolerance: Money,
    now: DateTime<Utc>,
) -> DbResult<Settled> {
    let mut order = fetch(&mut *conn, order_number)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_number.to_string()))?;

    let paid = payment::sum_confirmed(&mut *conn, order_number).await?;
    let settlement = Settlement::compute(order.total(), paid, tolerance);

    order.amount_paid = settlement.amount_paid.pesos();
    order.balance = settlement.balance.pesos();
    order.payment_status = settlement.status;

    let advance_to = auto_advance(order.fulfillment_status, settlement.status);
    if let Some(target) = advance_to {
        let change = transition_fulfillment(&order, target, now)?;
        apply_change(&mut order, change);
    }
    order.updated_at = now;

    write_state(conn, &order).await?;

    debug!(
        order_number = %order_number,
        amount_paid = order.amount_paid,
        balance = order.balance,
        status = %order.payment_status,
        advanced = advance_to.is_some(),
        "Order settled"
    );

    Ok(Settled {
        order,
        advanced: advance_to.is_some(),
    })
}

fn apply_change(order: &mut Order, change: FulfillmentChange) {
    order.fulfillment_status = change.status;
    order.printed_at = change.printed_at;
    order.packed_at = change.packed_at;
    order.shipped_at = change.shipped_at;
}

async fn write_state(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE orders SET
            amount_paid = ?1,
            balance = ?2,
            payment_status = ?3,
            fulfillment_status = ?4,
            printed_at = ?5,
            packed_at = ?6,
            shipped_at = ?7,
            updated_at = ?8
        WHERE order_number = ?9
        "#,
    )
    .bind(order.amount_paid)
    .bind(order.balance)
    .bind(order.payment_status)
    .bind(order.fulfillment_status)
    .bind(order.printed_at)
    .bind(order.packed_at)
    .bind(order.shipped_at)
    .bind(order.updated_at)
    .bind(&order.order_number)
    .execute(conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::test_support::{external_order, test_db};
    use payproof_core::{Currency, PAYMENT_TOLERANCE};

    fn tolerance() -> Money {
        Money::from_pesos(PAYMENT_TOLERANCE)
    }

    #[tokio::test]
    async fn test_upsert_creates_order_with_full_balance() {
        let db = test_db().await;
        let order = db.orders().upsert(&external_order("1042", 30_000)).await.unwrap();

        assert_eq!(order.total_amount, 30_000);
        assert_eq!(order.amount_paid, 0);
        assert_eq!(order.balance, 30_000);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.fulfillment_status, FulfillmentStatus::AwaitingPayment);
        assert_eq!(order.currency, Currency::Ars);
        assert_eq!(order.customer_name.as_deref(), Some("Lucia Gomez"));
    }

    #[tokio::test]
    async fn test_upsert_keeps_total_and_fills_missing_customer_data() {
        let db = test_db().await;
        db.orders().upsert(&external_order("1042", 30_000)).await.unwrap();

        let mut again = external_order("1042", 99_999);
        again.customer.name = Some("Otro Nombre".to_string());
        again.customer.email = Some("lucia@example.com".to_string());
        let order = db.orders().upsert(&again).await.unwrap();

        assert_eq!(order.total_amount, 30_000);
        assert_eq!(order.balance, 30_000);
        assert_eq!(order.customer_name.as_deref(), Some("Lucia Gomez"));
        assert_eq!(order.customer_email.as_deref(), Some("lucia@example.com"));
    }

    #[tokio::test]
    async fn test_get_required_unknown_order() {
        let db = test_db().await;
        assert!(db.orders().get("nope").await.unwrap().is_none());
        let err = db.orders().get_required("nope").await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::OrderNotFound(n)) if n == "nope"));
    }

    #[tokio::test]
    async fn test_packed_timestamp_is_set_once() {
        let db = test_db().await;
        db.orders().upsert(&external_order("1042", 30_000)).await.unwrap();

        let first = db
            .orders()
            .transition_fulfillment("1042", FulfillmentStatus::Packed)
            .await
            .unwrap();
        assert_eq!(first.previous, FulfillmentStatus::AwaitingPayment);
        let packed_at = first.order.packed_at.unwrap();

        db.orders()
            .transition_fulfillment("1042", FulfillmentStatus::ReadyToPrint)
            .await
            .unwrap();
        let again = db
            .orders()
            .transition_fulfillment("1042", FulfillmentStatus::Packed)
            .await
            .unwrap();

        assert_eq!(again.order.packed_at, Some(packed_at));
        assert!(again.order.printed_at.is_some());
    }

    #[tokio::test]
    async fn test_shipping_partially_paid_order_is_refused() {
        let db = test_db().await;
        db.orders().upsert(&external_order("1042", 30_000)).await.unwrap();
        db.payments()
            .record_cash("1042", Money::from_pesos(10_000), "caja", None, tolerance())
            .await
            .unwrap();

        let err = db
            .orders()
            .transition_fulfillment("1042", FulfillmentStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::PaymentIncomplete {
                payment_status: PaymentStatus::ConfirmedPartial,
                ..
            })
        ));

        let order = db.orders().get_required("1042").await.unwrap();
        assert!(order.shipped_at.is_none());
        assert_eq!(order.fulfillment_status, FulfillmentStatus::AwaitingPayment);
    }

    #[tokio::test]
    async fn test_shipping_paid_order_stamps_shipped_at() {
        let db = test_db().await;
        db.orders().upsert(&external_order("1042", 30_000)).await.unwrap();
        db.payments()
            .record_cash("1042", Money::from_pesos(30_000), "caja", None, tolerance())
            .await
            .unwrap();

        let outcome = db
            .orders()
            .transition_fulfillment("1042", FulfillmentStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(outcome.previous, FulfillmentStatus::ReadyToPrint);
        assert!(outcome.order.shipped_at.is_some());
    }

    #[tokio::test]
    async fn test_transition_unknown_order() {
        let db = test_db().await;
        let err = db
            .orders()
            .transition_fulfillment("ghost", FulfillmentStatus::Packed)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::OrderNotFound(_))));
    }
}

//! # Receipt Log Repository
//!
//! Append-only audit trail of everything that happens to a receipt.
//! Triggers in the schema refuse UPDATE and DELETE on `receipt_logs`.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use payproof_core::{Actor, LogAction, LogEntry};

/// Repository for the receipt audit log.
#[derive(Debug, Clone)]
pub struct ReceiptLogRepository {
    pool: SqlitePool,
}

impl ReceiptLogRepository {
    /// Creates a new ReceiptLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceiptLogRepository { pool }
    }

    /// Appends an entry outside any other unit of work.
    ///
    /// Used for after-the-fact events such as notification dispatch.
    pub async fn append(
        &self,
        receipt_id: &str,
        action: &LogAction,
        actor: Actor,
    ) -> DbResult<LogEntry> {
        append(&self.pool, receipt_id, action, actor, Utc::now()).await
    }

    /// Entries of one receipt, newest first.
    pub async fn list_for_receipt(&self, receipt_id: &str) -> DbResult<Vec<LogEntry>> {
        let entries = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT * FROM receipt_logs
            WHERE receipt_id = ?1
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(receipt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Entries of every receipt attached to an order, newest first.
    pub async fn list_for_order(&self, order_number: &str) -> DbResult<Vec<LogEntry>> {
        let entries = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT l.* FROM receipt_logs l
            JOIN receipts r ON r.id = l.receipt_id
            WHERE r.order_number = ?1
            ORDER BY l.created_at DESC, l.rowid DESC
            "#,
        )
        .bind(order_number)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

pub(crate) async fn append<'e, E>(
    executor: E,
    receipt_id: &str,
    action: &LogAction,
    actor: Actor,
    now: DateTime<Utc>,
) -> DbResult<LogEntry>
where
    E: Executor<'e, Database = Sqlite>,
{
    let entry = LogEntry {
        id: Uuid::new_v4().to_string(),
        receipt_id: receipt_id.to_string(),
        action: action.to_string(),
        actor,
        created_at: now,
    };

    debug!(receipt_id = %receipt_id, action = %entry.action, actor = %actor, "Appending receipt log");

    sqlx::query(
        r#"
        INSERT INTO receipt_logs (id, receipt_id, action, actor, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.receipt_id)
    .bind(&entry.action)
    .bind(entry.actor)
    .bind(entry.created_at)
    .execute(executor)
    .await?;

    Ok(entry)
}

// =============================================================================
// Unit Tests
// =============================================================================

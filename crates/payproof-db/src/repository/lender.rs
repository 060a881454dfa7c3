//! # Lender Repository
//!
//! Financing partners that review receipts mentioning them.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use payproof_core::Lender;

/// Repository for lender database operations.
#[derive(Debug, Clone)]
pub struct LenderRepository {
    pool: SqlitePool,
}

impl LenderRepository {
    /// Creates a new LenderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LenderRepository { pool }
    }

    /// Registers an active lender.
    ///
    /// Keywords are stored comma-separated; blank ones are dropped.
    pub async fn insert(&self, name: &str, phone: &str, keywords: &[&str]) -> DbResult<Lender> {
        let lender = Lender {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
            keywords: keywords
                .iter()
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
                .join(","),
            active: true,
            created_at: Utc::now(),
        };

        debug!(id = %lender.id, name = %lender.name, "Inserting lender");

        sqlx::query(
            r#"
            INSERT INTO lenders (id, name, phone, keywords, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&lender.id)
        .bind(&lender.name)
        .bind(&lender.phone)
        .bind(&lender.keywords)
        .bind(lender.active)
        .bind(lender.created_at)
        .execute(&self.pool)
        .await?;

        Ok(lender)
    }

    /// Active lenders in registration order.
    pub async fn list_active(&self) -> DbResult<Vec<Lender>> {
        let lenders = sqlx::query_as::<_, Lender>(
            "SELECT * FROM lenders WHERE active = 1 ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(lenders)
    }

    /// Enables or disables a lender.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let changed = sqlx::query("UPDATE lenders SET active = ?1 WHERE id = ?2")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if changed == 0 {
            return Err(DbError::not_found("Lender", id));
        }
        Ok(())
    }
}

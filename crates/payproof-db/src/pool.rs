//! # Connection Pool
//!
//! Opens the PayProof SQLite file and hands out repositories bound to it.
//!
//! ## Who Waits Where
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 pool (max_connections, acquire_timeout)                 │
//! │                                                                         │
//! │  receipts().insert ──┐                                                  │
//! │  receipts().confirm ─┤   writers: first statement is an UPDATE,         │
//! │  payments().record ──┤   so they queue on SQLite's write lock for at    │
//! │  orders().transition ┘   most busy_timeout, one unit of work at a time  │
//! │                                                                         │
//! │  order / receipt reads ─ readers never block (journal_mode = WAL)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `:memory:` is special-cased: it opens one private database that lives as
//! long as the pool's single connection.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::lender::LenderRepository;
use crate::repository::log::ReceiptLogRepository;
use crate::repository::order::OrderRepository;
use crate::repository::payment::PaymentRepository;
use crate::repository::receipt::ReceiptRepository;

const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the database lives and how hard the pool may push it.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/payproof/payproof.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created on first open. `:memory:` for tests.
    pub path: PathBuf,

    /// Upper bound on open connections. Default: 5
    pub max_connections: u32,

    /// Connections kept open while idle. Default: 1
    pub min_idle: u32,

    /// How long a caller waits for a free connection. Default: 30 seconds
    pub acquire_timeout: Duration,

    /// How long a writer waits for SQLite's write lock. Default: 5 seconds
    pub busy_timeout: Duration,

    /// Idle connections above `min_idle` are closed after this. Default: 10 minutes
    pub idle_timeout: Duration,

    /// Apply embedded migrations when the pool opens. Default: true
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            min_idle: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            migrate: true,
        }
    }

    /// Private in-memory database with a single connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Opens the pool without touching the schema.
    pub fn skip_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    /// SQLite pragmas shared by every connection of the pool.
    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
        };

        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the PayProof database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and, unless disabled, brings the schema up to date.
    ///
    /// ## Errors
    /// - `ConnectionFailed` when the file can't be opened or created
    /// - `MigrationFailed` when an embedded migration doesn't apply
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening PayProof database");

        let options = config.connect_options()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_idle.min(config.max_connections))
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .connect_with(options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending embedded migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for ad-hoc queries the repositories don't cover.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone())
    }

    pub fn receipts(&self) -> ReceiptRepository {
        ReceiptRepository::new(self.pool.clone())
    }

    /// Cash payments.
    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    /// Append-only receipt audit log.
    pub fn logs(&self) -> ReceiptLogRepository {
        ReceiptLogRepository::new(self.pool.clone())
    }

    pub fn lenders(&self) -> LenderRepository {
        LenderRepository::new(self.pool.clone())
    }

    /// Waits for checked-out connections and closes the pool.
    /// Every later query fails with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing PayProof database");
        self.pool.close().await;
    }

    /// True while the pool can still run a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

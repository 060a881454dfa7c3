//! # Reconciliation Engine
//!
//! The service object that ties the pure rules, the database and the
//! collaborators together.
//!
//! ## Receipt Ingestion
//! ```text
//! ingest_receipt(order_number, image)
//!      │
//!      ├─ 1. validate order number
//!      ├─ 2. local order, or sync it from the store ─── unknown ──► OrderNotFound
//!      ├─ 3. OCR (timeout) ─────────────────────────── fails ────► External / Timeout
//!      ├─ 4. plausibility check ────────────────────── fails ────► Validation
//!      ├─ 5. fingerprint, duplicate pre-check ──────── seen ─────► DuplicateReceipt
//!      ├─ 6. extract amount
//!      ├─ 7. store image (timeout) ─────────────────── fails ────► External / Timeout
//!      ├─ 8. insert receipt + "created" log (one transaction)
//!      │        └─ lost race on the fingerprint ────────────────► DuplicateReceipt
//!      │
//!      │   everything below is best effort: failures are logged, never returned
//!      │
//!      ├─ 9. project settlement, notify the customer
//!      └─ 10. route to a lender when the text names one
//! ```
//!
//! Nothing is persisted before step 8, so a failed OCR or upload leaves no
//! receipt behind.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use payproof_core::extract::{extract, Extraction};
use payproof_core::lender::detect_lender;
use payproof_core::settlement::Settlement;
use payproof_core::text::fingerprint;
use payproof_core::validation::{
    validate_cash_amount, validate_order_number, validate_reason, validate_receipt_text,
};
use payproof_core::{
    Actor, CoreError, FulfillmentStatus, LogAction, Money, NewReceipt, Order, Receipt,
    ValidationError,
};
use payproof_db::{
    CashOutcome, ConfirmOutcome, Database, FulfillmentOutcome, RejectOutcome,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::notify::{Message, NotificationDispatcher};
use crate::ports::{NoOpNotifier, Notifier, ObjectStorage, OcrProvider, OrderSource, PortResult};
use crate::views::{payment_history, OrderDetail, PaymentHistoryEntry, ReceiptDetail};

/// Shown in messages when the store has no customer name.
const FALLBACK_CUSTOMER_NAME: &str = "Cliente";

/// Recorded as the author of cash payments registered without one.
const DEFAULT_RECORDER: &str = "system";

/// Result of a successful receipt upload.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub receipt: Receipt,
    pub order: Order,
    pub extraction: Extraction,
    /// A customer message was dispatched. Delivery happens in the
    /// background and is not reflected here.
    pub customer_notified: bool,
    /// Name of the lender the receipt was forwarded to.
    pub lender: Option<String>,
}

// =============================================================================
// Engine
// =============================================================================

/// Receipt reconciliation service.
pub struct ReconciliationEngine {
    db: Database,
    config: EngineConfig,
    orders: Arc<dyn OrderSource>,
    ocr: Arc<dyn OcrProvider>,
    storage: Arc<dyn ObjectStorage>,
    notifications: NotificationDispatcher,
}

impl ReconciliationEngine {
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Pulls an order from the store and upserts it locally.
    ///
    /// The local total is never overwritten; only missing customer fields
    /// are filled in.
    pub async fn sync_order(&self, order_number: &str) -> EngineResult<Order> {
        validate_order_number(order_number)?;

        let external = self
            .call("order source", self.orders.fetch_order(order_number))
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_number.to_string()))?;

        let order = self.db.orders().upsert(&external).await?;

        info!(
            order_number = %order.order_number,
            total = order.total_amount,
            "Order synced"
        );

        Ok(order)
    }

    /// Handles the store's "order created" event.
    ///
    /// Syncs the order and greets the customer with the order summary.
    pub async fn handle_order_created(&self, order_number: &str) -> EngineResult<Order> {
        let order = self.sync_order(order_number).await?;

        match self.customer_phone(&order) {
            Some(phone) => {
                self.notifications
                    .dispatch(Message {
                        phone: phone.to_string(),
                        template: self.config.notifications.templates.order_created.clone(),
                        variables: vec![
                            customer_name(&order),
                            order.order_number.clone(),
                            order.total().to_string(),
                        ],
                    })
                    .await;
            }
            None => debug!(order_number = %order.order_number, "Customer not reachable, no greeting"),
        }

        Ok(order)
    }

    // =========================================================================
    // Receipt Ingestion
    // =========================================================================

    /// Ingests an uploaded receipt image for an order.
    ///
    /// ## Errors
    /// - `Validation` for a malformed order number or non-receipt text
    /// - `OrderNotFound` when neither the database nor the store know the order
    /// - `DuplicateReceipt` when the same receipt text was already submitted
    /// - `External` / `Timeout` when OCR or storage fail; nothing is persisted
    pub async fn ingest_receipt(
        &self,
        order_number: &str,
        image: &[u8],
        file_name: &str,
    ) -> EngineResult<IngestOutcome> {
        validate_order_number(order_number)?;

        let order = match self.db.orders().get(order_number).await? {
            Some(order) => order,
            None => self.sync_order(order_number).await?,
        };

        let raw_text = self.call("ocr", self.ocr.extract_text(image)).await?;
        if raw_text.trim().is_empty() {
            return Err(ValidationError::NotAReceipt {
                reason: "no text found in image".to_string(),
            }
            .into());
        }
        validate_receipt_text(&raw_text)?;

        let fingerprint = fingerprint(&raw_text)?;
        if let Some(existing) = self.db.receipts().find_by_fingerprint(fingerprint.as_str()).await? {
            info!(
                order_number = %order_number,
                existing_receipt_id = %existing.id,
                "Duplicate receipt refused"
            );
            return Err(CoreError::DuplicateReceipt {
                fingerprint: fingerprint.into_inner(),
                existing_receipt_id: Some(existing.id),
            }
            .into());
        }

        let extraction = extract(&raw_text);

        let object_name = format!(
            "{}/{}-{}",
            order_number,
            Utc::now().timestamp_millis(),
            file_name
        );
        let location = self
            .call("storage", self.storage.store(image, &object_name))
            .await?;

        let receipt = self
            .db
            .receipts()
            .insert(
                &NewReceipt {
                    order_number: order.order_number.clone(),
                    raw_text,
                    fingerprint,
                    detected_amount: extraction.amount,
                    reference_order_total: order.total(),
                    image_location: Some(location),
                },
                Actor::Customer,
            )
            .await?;

        info!(
            receipt_id = %receipt.id,
            order_number = %receipt.order_number,
            detected_amount = ?receipt.detected_amount,
            "Receipt ingested"
        );

        let customer_notified = self.notify_upload(&order, &receipt).await;
        let lender = self.route_to_lender(&order, &receipt).await;

        Ok(IngestOutcome {
            receipt,
            order,
            extraction,
            customer_notified,
            lender,
        })
    }

    /// Tells the customer how the order would stand if every pending receipt
    /// were accepted.
    async fn notify_upload(&self, order: &Order, receipt: &Receipt) -> bool {
        let Some(phone) = self.customer_phone(order) else {
            debug!(order_number = %order.order_number, "Customer not reachable, upload not announced");
            return false;
        };

        let projected = match self.db.payments().projected_total(&order.order_number).await {
            Ok(projected) => projected,
            Err(e) => {
                warn!(order_number = %order.order_number, error = %e, "Could not project settlement");
                return false;
            }
        };

        let settlement = Settlement::compute(order.total(), projected, self.config.tolerance());
        let templates = &self.config.notifications.templates;
        let name = customer_name(order);
        let amount = receipt.detected().unwrap_or_default().to_string();

        let message = if settlement.status.is_fully_paid() {
            Message {
                phone: phone.to_string(),
                template: templates.payment_complete.clone(),
                variables: vec![name, amount],
            }
        } else {
            Message {
                phone: phone.to_string(),
                template: templates.payment_incomplete.clone(),
                variables: vec![name, amount, settlement.balance.to_string()],
            }
        };

        if !self.notifications.dispatch(message).await {
            return false;
        }

        self.append_log(&receipt.id, &LogAction::CustomerNotified).await;
        true
    }

    /// Forwards the receipt to the first lender its text names.
    async fn route_to_lender(&self, order: &Order, receipt: &Receipt) -> Option<String> {
        if !self.config.notifications.forward_to_lenders {
            return None;
        }

        // Forwarding follows the customer allow-list.
        let phone = order.customer_phone.as_deref().unwrap_or_default();
        if !self.notifications.customer_allowed(phone) {
            return None;
        }

        let lenders = match self.db.lenders().list_active().await {
            Ok(lenders) => lenders,
            Err(e) => {
                warn!(error = %e, "Could not load lenders");
                return None;
            }
        };
        let lender = detect_lender(&receipt.raw_text, &lenders)?;
        let location = receipt.image_location.as_deref()?;

        let url = match self.call("storage", self.storage.public_url(location)).await {
            Ok(url) => url,
            Err(e) => {
                warn!(receipt_id = %receipt.id, error = %e, "No public URL for lender review");
                return None;
            }
        };

        let sent = self
            .notifications
            .dispatch(Message {
                phone: lender.phone.clone(),
                template: self.config.notifications.templates.lender_review.clone(),
                variables: vec![url, receipt.id.clone()],
            })
            .await;
        if !sent {
            return None;
        }

        info!(receipt_id = %receipt.id, lender = %lender.name, "Receipt forwarded to lender");
        self.append_log(&receipt.id, &LogAction::LenderNotified).await;
        Some(lender.name.clone())
    }

    // =========================================================================
    // Operator Decisions
    // =========================================================================

    /// Confirms a pending receipt and recomputes its order.
    pub async fn confirm_receipt(&self, receipt_id: &str, actor: Actor) -> EngineResult<ConfirmOutcome> {
        let outcome = self
            .db
            .receipts()
            .confirm(receipt_id, actor, self.config.tolerance())
            .await?;

        if outcome.advanced {
            info!(order_number = %outcome.order.order_number, "Order ready to print");
        }

        Ok(outcome)
    }

    /// Rejects a pending receipt, flagging its order.
    pub async fn reject_receipt(
        &self,
        receipt_id: &str,
        reason: Option<&str>,
        actor: Actor,
    ) -> EngineResult<RejectOutcome> {
        let reason = validate_reason(reason)?;
        Ok(self.db.receipts().reject(receipt_id, reason, actor).await?)
    }

    /// Registers a cash payment and recomputes the order.
    pub async fn register_cash_payment(
        &self,
        order_number: &str,
        amount: Money,
        recorded_by: Option<&str>,
        note: Option<&str>,
    ) -> EngineResult<CashOutcome> {
        validate_order_number(order_number)?;
        validate_cash_amount(amount.pesos())?;

        let recorded_by = recorded_by
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RECORDER);
        let note = note.map(str::trim).filter(|n| !n.is_empty());

        Ok(self
            .db
            .payments()
            .record_cash(order_number, amount, recorded_by, note, self.config.tolerance())
            .await?)
    }

    // =========================================================================
    // Fulfillment
    // =========================================================================

    /// Moves an order to a fulfillment status.
    ///
    /// ## Errors
    /// `PaymentIncomplete` when the target ships goods and the order is not
    /// fully paid.
    pub async fn transition_fulfillment(
        &self,
        order_number: &str,
        target: FulfillmentStatus,
    ) -> EngineResult<FulfillmentOutcome> {
        validate_order_number(order_number)?;
        Ok(self.db.orders().transition_fulfillment(order_number, target).await?)
    }

    /// Same as [`Self::transition_fulfillment`] with the status given by name,
    /// e.g. `"packed"`.
    pub async fn request_fulfillment(
        &self,
        order_number: &str,
        target: &str,
    ) -> EngineResult<FulfillmentOutcome> {
        let target: FulfillmentStatus = target.parse()?;
        self.transition_fulfillment(order_number, target).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn order_detail(&self, order_number: &str) -> EngineResult<OrderDetail> {
        let order = self.db.orders().get_required(order_number).await?;
        Ok(OrderDetail {
            receipts: self.db.receipts().list_for_order(order_number).await?,
            cash_payments: self.db.payments().list_for_order(order_number).await?,
            logs: self.db.logs().list_for_order(order_number).await?,
            order,
        })
    }

    pub async fn receipt_detail(&self, receipt_id: &str) -> EngineResult<ReceiptDetail> {
        let receipt = self.db.receipts().get_required(receipt_id).await?;
        Ok(ReceiptDetail {
            logs: self.db.logs().list_for_receipt(receipt_id).await?,
            receipt,
        })
    }

    /// Receipts and cash payments of an order, newest first.
    pub async fn payment_history(&self, order_number: &str) -> EngineResult<Vec<PaymentHistoryEntry>> {
        self.db.orders().get_required(order_number).await?;
        let receipts = self.db.receipts().list_for_order(order_number).await?;
        let cash = self.db.payments().list_for_order(order_number).await?;
        Ok(payment_history(&receipts, &cash))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Waits for in-flight notifications.
    pub async fn flush_notifications(&self) {
        self.notifications.flush().await;
    }

    /// Drains notifications and closes the database pool.
    pub async fn shutdown(&self) {
        info!("Shutting down reconciliation engine");
        self.notifications.flush().await;
        self.db.close().await;
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Runs a collaborator call under the configured timeout.
    async fn call<T>(
        &self,
        service: &'static str,
        fut: impl Future<Output = PortResult<T>>,
    ) -> EngineResult<T> {
        let timeout = self.config.external_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(service, error = %e, "Collaborator call failed");
                Err(EngineError::external(service, e.to_string()))
            }
            Err(_) => {
                warn!(service, timeout_secs = timeout.as_secs(), "Collaborator call timed out");
                Err(EngineError::Timeout {
                    service: service.to_string(),
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Customer phone, if present and allowed.
    fn customer_phone<'a>(&self, order: &'a Order) -> Option<&'a str> {
        order
            .customer_phone
            .as_deref()
            .filter(|phone| self.notifications.customer_allowed(phone))
    }

    async fn append_log(&self, receipt_id: &str, action: &LogAction) {
        if let Err(e) = self.db.logs().append(receipt_id, action, Actor::System).await {
            warn!(receipt_id, action = %action, error = %e, "Could not write receipt log");
        }
    }
}

fn customer_name(order: &Order) -> String {
    order
        .customer_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_CUSTOMER_NAME)
        .to_string()
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a ReconciliationEngine.
pub struct ReconciliationEngineBuilder {
    config: EngineConfig,
    db: Option<Database>,
    orders: Option<Arc<dyn OrderSource>>,
    ocr: Option<Arc<dyn OcrProvider>>,
    storage: Option<Arc<dyn ObjectStorage>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ReconciliationEngineBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: EngineConfig) -> Self {
        ReconciliationEngineBuilder {
            config,
            db: None,
            orders: None,
            ocr: None,
            storage: None,
            notifier: None,
        }
    }

    pub fn with_database(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_order_source(mut self, orders: Arc<dyn OrderSource>) -> Self {
        self.orders = Some(orders);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrProvider>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the messaging client. Messages are dropped when none is given.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> EngineResult<ReconciliationEngine> {
        self.config.validate()?;

        let db = self
            .db
            .ok_or_else(|| EngineError::InvalidConfig("Database required".into()))?;
        let orders = self
            .orders
            .ok_or_else(|| EngineError::InvalidConfig("Order source required".into()))?;
        let ocr = self
            .ocr
            .ok_or_else(|| EngineError::InvalidConfig("OCR provider required".into()))?;
        let storage = self
            .storage
            .ok_or_else(|| EngineError::InvalidConfig("Object storage required".into()))?;
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(NoOpNotifier));

        let notifications = NotificationDispatcher::new(
            notifier,
            self.config.notifications.clone(),
            self.config.external_timeout(),
        );

        Ok(ReconciliationEngine {
            db,
            config: self.config,
            orders,
            ocr,
            storage,
            notifications,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, FakeNotifier, FakeOcr, FakeOrderSource, FakeStorage};
    use payproof_core::{PaymentStatus, ReceiptStatus};
    use payproof_db::DbConfig;
    use std::time::Duration;

    const PHONE: &str = "5491155550000";
    const LENDER_PHONE: &str = "5491144440000";

    const SCENARIO_TEXT: &str = "Transferencia exitosa. Importe: $ 50.500,00. CBU 000000031000";

    struct Harness {
        engine: ReconciliationEngine,
        notifier: Arc<FakeNotifier>,
        storage: Arc<FakeStorage>,
    }

    impl Harness {
        async fn sent(&self) -> Vec<Message> {
            self.engine.flush_notifications().await;
            self.notifier.sent().await
        }
    }

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.external.timeout_secs = 1;
        config
    }

    async fn harness_with(
        config: EngineConfig,
        orders: FakeOrderSource,
        ocr: FakeOcr,
        storage: FakeStorage,
        notifier: FakeNotifier,
    ) -> Harness {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        orders.add("1001", 50_000, Some(PHONE)).await;
        orders.add("1002", 30_000, Some(PHONE)).await;
        orders.add("1003", 30_000, None).await;

        let notifier = Arc::new(notifier);
        let storage = Arc::new(storage);
        let engine = ReconciliationEngineBuilder::new(config)
            .with_database(db)
            .with_order_source(Arc::new(orders))
            .with_ocr(Arc::new(ocr))
            .with_storage(storage.clone())
            .with_notifier(notifier.clone())
            .build()
            .unwrap();

        Harness {
            engine,
            notifier,
            storage,
        }
    }

    async fn harness() -> Harness {
        harness_with(
            test_config(),
            FakeOrderSource::default(),
            FakeOcr::default(),
            FakeStorage::default(),
            FakeNotifier::default(),
        )
        .await
    }

    async fn upload(h: &Harness, order_number: &str, text: &str) -> EngineResult<IngestOutcome> {
        h.engine
            .ingest_receipt(order_number, text.as_bytes(), "comprobante.jpg")
            .await
    }

    fn log_actions(detail: &ReceiptDetail) -> Vec<&str> {
        detail.logs.iter().map(|l| l.action.as_str()).collect()
    }

    // -------------------------------------------------------------------------
    // Builder
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_builder_requires_collaborators() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = ReconciliationEngineBuilder::new(EngineConfig::default())
            .with_database(db)
            .build()
            .err()
            .unwrap();
        assert!(err.is_config_error());

        let err = ReconciliationEngineBuilder::new(EngineConfig::default())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::InvalidConfig(msg) if msg == "Database required"));
    }

    // -------------------------------------------------------------------------
    // Ingestion
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_transfer_scenario_end_to_end() {
        let h = harness().await;

        let outcome = upload(&h, "1001", SCENARIO_TEXT).await.unwrap();
        assert_eq!(outcome.extraction.amount, Some(Money::from_pesos(50_500)));
        assert_eq!(outcome.receipt.status, ReceiptStatus::Pending);
        assert_eq!(outcome.receipt.reference_order_total, 50_000);
        assert!(outcome
            .receipt
            .image_location
            .as_deref()
            .unwrap()
            .starts_with("receipts/1001/"));
        assert!(outcome.customer_notified);
        assert_eq!(outcome.lender, None);

        let sent = h.sent().await;
        assert_eq!(
            sent,
            vec![Message {
                phone: PHONE.to_string(),
                template: "todo_pago".to_string(),
                variables: vec!["Lucia Gomez".to_string(), "$50.500".to_string()],
            }]
        );

        let confirmed = h
            .engine
            .confirm_receipt(&outcome.receipt.id, Actor::Operator)
            .await
            .unwrap();
        assert!(confirmed.advanced);
        assert_eq!(confirmed.order.payment_status, PaymentStatus::ConfirmedTotal);
        assert_eq!(confirmed.order.amount_paid, 50_500);
        assert_eq!(confirmed.order.balance, -500);
        assert_eq!(confirmed.order.fulfillment_status, FulfillmentStatus::ReadyToPrint);
        assert!(confirmed.order.printed_at.is_some());

        let detail = h.engine.receipt_detail(&outcome.receipt.id).await.unwrap();
        assert_eq!(
            log_actions(&detail),
            vec!["confirmed", "customer_notified", "created"]
        );
    }

    #[tokio::test]
    async fn test_cash_and_receipt_settle_partially() {
        let h = harness().await;

        h.engine.sync_order("1002").await.unwrap();
        let cash = h
            .engine
            .register_cash_payment("1002", Money::from_pesos(15_000), Some("caja"), Some("  "))
            .await
            .unwrap();
        assert_eq!(cash.payment.recorded_by, "caja");
        assert_eq!(cash.payment.note, None);
        assert_eq!(cash.order.payment_status, PaymentStatus::ConfirmedPartial);

        let outcome = upload(&h, "1002", "Comprobante de pago. Importe $ 10.000,00 operacion 1")
            .await
            .unwrap();
        assert_eq!(outcome.extraction.amount, Some(Money::from_pesos(10_000)));

        let sent = h.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "pago_incompleto");
        assert_eq!(
            sent[0].variables,
            vec!["Lucia Gomez".to_string(), "$10.000".to_string(), "$5.000".to_string()]
        );

        let confirmed = h
            .engine
            .confirm_receipt(&outcome.receipt.id, Actor::Operator)
            .await
            .unwrap();
        assert!(!confirmed.advanced);
        assert_eq!(confirmed.order.amount_paid, 25_000);
        assert_eq!(confirmed.order.balance, 5_000);
        assert_eq!(confirmed.order.payment_status, PaymentStatus::ConfirmedPartial);
        assert_eq!(confirmed.order.fulfillment_status, FulfillmentStatus::AwaitingPayment);

        let history = h.engine.payment_history("1002").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.status == ReceiptStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_tolerance_boundary() {
        let h = harness().await;

        let outcome = upload(&h, "1003", "Transferencia realizada. Importe $ 28.999,00")
            .await
            .unwrap();
        // 1003 has no phone
        assert!(!outcome.customer_notified);

        let confirmed = h
            .engine
            .confirm_receipt(&outcome.receipt.id, Actor::Operator)
            .await
            .unwrap();
        assert_eq!(confirmed.order.balance, 1_001);
        assert_eq!(confirmed.order.payment_status, PaymentStatus::ConfirmedPartial);

        let cash = h
            .engine
            .register_cash_payment("1003", Money::from_pesos(1), None, None)
            .await
            .unwrap();
        assert_eq!(cash.payment.recorded_by, "system");
        assert_eq!(cash.order.balance, 1_000);
        assert_eq!(cash.order.payment_status, PaymentStatus::ConfirmedTotal);
        assert!(cash.advanced);
        assert!(h.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_double_confirm_counts_once() {
        let h = harness().await;
        let outcome = upload(&h, "1001", SCENARIO_TEXT).await.unwrap();

        h.engine
            .confirm_receipt(&outcome.receipt.id, Actor::Operator)
            .await
            .unwrap();
        let err = h
            .engine
            .confirm_receipt(&outcome.receipt.id, Actor::Operator)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "already_processed");

        let detail = h.engine.order_detail("1001").await.unwrap();
        assert_eq!(detail.order.amount_paid, 50_500);
        assert_eq!(detail.receipts.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_receipt_across_orders() {
        let h = harness().await;
        let first = upload(&h, "1001", SCENARIO_TEXT).await.unwrap();

        // Same text, different spacing and case
        let err = upload(&h, "1002", "TRANSFERENCIA   exitosa. Importe: $ 50.500,00. CBU 000000031000")
            .await
            .unwrap_err();
        match err {
            EngineError::Core(CoreError::DuplicateReceipt {
                existing_receipt_id, ..
            }) => assert_eq!(existing_receipt_id, Some(first.receipt.id)),
            other => panic!("expected duplicate, got {other:?}"),
        }

        // The image was never uploaded for the duplicate
        assert_eq!(h.storage.stored().await.len(), 1);
        assert!(h.engine.order_detail("1002").await.unwrap().receipts.is_empty());
    }

    #[tokio::test]
    async fn test_non_receipt_text_is_refused() {
        let h = harness().await;

        let err = upload(&h, "1001", "foto de mi perro en la playa").await.unwrap_err();
        assert_eq!(err.code(), "validation");
        assert!(err.is_user_correctable());

        let err = upload(&h, "1001", "   ").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::Validation(ValidationError::NotAReceipt { .. }))
        ));

        assert!(h.storage.stored().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_order_is_refused() {
        let h = harness().await;
        let err = upload(&h, "9999", SCENARIO_TEXT).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::OrderNotFound(_))));

        let err = upload(&h, "bad order", SCENARIO_TEXT).await.unwrap_err();
        assert_eq!(err.code(), "validation");
    }

    #[tokio::test]
    async fn test_ocr_timeout_persists_nothing() {
        let h = harness_with(
            test_config(),
            FakeOrderSource::default(),
            FakeOcr {
                behavior: Behavior::Hang(Duration::from_secs(30)),
            },
            FakeStorage::default(),
            FakeNotifier::default(),
        )
        .await;

        let err = upload(&h, "1001", SCENARIO_TEXT).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout { ref service, secs: 1 } if service == "ocr"));
        assert!(err.is_retryable());

        let detail = h.engine.order_detail("1001").await.unwrap();
        assert!(detail.receipts.is_empty());
        assert!(h.storage.stored().await.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_persists_nothing() {
        let h = harness_with(
            test_config(),
            FakeOrderSource::default(),
            FakeOcr::default(),
            FakeStorage::with(Behavior::Fail),
            FakeNotifier::default(),
        )
        .await;

        let err = upload(&h, "1001", SCENARIO_TEXT).await.unwrap_err();
        assert!(matches!(err, EngineError::External { ref service, .. } if service == "storage"));
        assert!(err.is_retryable());
        assert!(h.engine.order_detail("1001").await.unwrap().receipts.is_empty());
        assert!(h.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_order_source_failure_is_external() {
        let h = harness_with(
            test_config(),
            FakeOrderSource::with(Behavior::Fail),
            FakeOcr::default(),
            FakeStorage::default(),
            FakeNotifier::default(),
        )
        .await;

        let err = h.engine.sync_order("1001").await.unwrap_err();
        assert_eq!(err.code(), "transient_external");
    }

    #[tokio::test]
    async fn test_notification_failure_is_swallowed() {
        let h = harness_with(
            test_config(),
            FakeOrderSource::default(),
            FakeOcr::default(),
            FakeStorage::default(),
            FakeNotifier::failing(),
        )
        .await;

        let outcome = upload(&h, "1001", SCENARIO_TEXT).await.unwrap();
        h.engine.flush_notifications().await;
        assert!(h.sent().await.is_empty());

        // the log records the dispatch, even though delivery failed
        assert!(outcome.customer_notified);
        let detail = h.engine.receipt_detail(&outcome.receipt.id).await.unwrap();
        assert_eq!(detail.receipt.status, ReceiptStatus::Pending);
        assert!(log_actions(&detail).contains(&"customer_notified"));
    }

    #[tokio::test]
    async fn test_allow_list_blocks_other_customers() {
        let mut config = test_config();
        config.notifications.allowed_phones = vec!["+54 9 11 0000-0001".to_string()];
        let h = harness_with(
            config,
            FakeOrderSource::default(),
            FakeOcr::default(),
            FakeStorage::default(),
            FakeNotifier::default(),
        )
        .await;

        let outcome = upload(&h, "1001", SCENARIO_TEXT).await.unwrap();
        assert!(!outcome.customer_notified);
        assert!(h.sent().await.is_empty());

        let detail = h.engine.receipt_detail(&outcome.receipt.id).await.unwrap();
        assert_eq!(log_actions(&detail), vec!["created"]);
    }

    // -------------------------------------------------------------------------
    // Lender routing
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_lender_receives_named_receipt() {
        let h = harness().await;
        h.engine
            .database()
            .lenders()
            .insert("Credito Sur", LENDER_PHONE, &["credito sur"])
            .await
            .unwrap();

        let outcome = upload(
            &h,
            "1002",
            "Comprobante de pago financiado por CREDITO SUR. Importe $ 30.000,00",
        )
        .await
        .unwrap();
        assert_eq!(outcome.lender.as_deref(), Some("Credito Sur"));

        let sent = h.sent().await;
        assert_eq!(sent.len(), 2);
        let location = outcome.receipt.image_location.clone().unwrap();
        let review = sent.iter().find(|m| m.phone == LENDER_PHONE).unwrap();
        assert_eq!(review.template, "revision_financiera_v3");
        assert_eq!(
            review.variables,
            vec![format!("https://cdn.test/{location}"), outcome.receipt.id.clone()]
        );
        let customer = sent.iter().find(|m| m.phone == PHONE).unwrap();
        assert_eq!(customer.template, "todo_pago");

        let detail = h.engine.receipt_detail(&outcome.receipt.id).await.unwrap();
        assert_eq!(
            log_actions(&detail),
            vec!["lender_notified", "customer_notified", "created"]
        );
    }

    #[tokio::test]
    async fn test_lender_forwarding_can_be_disabled() {
        let mut config = test_config();
        config.notifications.forward_to_lenders = false;
        let h = harness_with(
            config,
            FakeOrderSource::default(),
            FakeOcr::default(),
            FakeStorage::default(),
            FakeNotifier::default(),
        )
        .await;
        h.engine
            .database()
            .lenders()
            .insert("Credito Sur", LENDER_PHONE, &["credito sur"])
            .await
            .unwrap();

        let outcome = upload(&h, "1002", "Comprobante de pago via Credito Sur. Importe $ 30.000,00")
            .await
            .unwrap();
        assert_eq!(outcome.lender, None);
        assert!(h.sent().await.iter().all(|m| m.phone != LENDER_PHONE));
    }

    // -------------------------------------------------------------------------
    // Decisions, fulfillment, order events
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_reject_flags_order() {
        let h = harness().await;
        let outcome = upload(&h, "1002", "Comprobante de pago. Importe $ 12.000,00").await.unwrap();

        let rejected = h
            .engine
            .reject_receipt(&outcome.receipt.id, Some("  monto ilegible "), Actor::Operator)
            .await
            .unwrap();
        assert_eq!(rejected.receipt.status, ReceiptStatus::Rejected);
        assert_eq!(rejected.order.payment_status, PaymentStatus::Rejected);

        let detail = h.engine.receipt_detail(&outcome.receipt.id).await.unwrap();
        assert_eq!(detail.logs[0].action, "rejected: monto ilegible");

        let err = h
            .engine
            .reject_receipt("no-such-receipt", None, Actor::Operator)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_shipping_requires_full_payment() {
        let h = harness().await;
        h.engine.sync_order("1002").await.unwrap();
        h.engine
            .register_cash_payment("1002", Money::from_pesos(10_000), Some("caja"), None)
            .await
            .unwrap();

        let err = h.engine.request_fulfillment("1002", "shipped").await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::PaymentIncomplete { .. })));
        assert_eq!(err.code(), "invalid_transition");

        // Packing is not guarded
        let packed = h.engine.request_fulfillment("1002", "packed").await.unwrap();
        assert_eq!(packed.order.fulfillment_status, FulfillmentStatus::Packed);

        h.engine
            .register_cash_payment("1002", Money::from_pesos(20_000), Some("caja"), None)
            .await
            .unwrap();
        let shipped = h
            .engine
            .transition_fulfillment("1002", FulfillmentStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.previous, FulfillmentStatus::Packed);
        assert!(shipped.order.shipped_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_fulfillment_status_name() {
        let h = harness().await;
        let err = h.engine.request_fulfillment("1001", "teleported").await.unwrap_err();
        assert_eq!(err.code(), "invalid_status");
    }

    #[tokio::test]
    async fn test_cash_validation() {
        let h = harness().await;
        h.engine.sync_order("1001").await.unwrap();

        let err = h
            .engine
            .register_cash_payment("1001", Money::zero(), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "validation");

        let err = h
            .engine
            .register_cash_payment("4040", Money::from_pesos(100), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_order_created_greets_customer() {
        let h = harness().await;

        let order = h.engine.handle_order_created("1001").await.unwrap();
        assert_eq!(order.total_amount, 50_000);
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        let sent = h.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "final");
        assert_eq!(
            sent[0].variables,
            vec!["Lucia Gomez".to_string(), "1001".to_string(), "$50.000".to_string()]
        );

        // No phone, no greeting
        h.engine.handle_order_created("1003").await.unwrap();
        assert_eq!(h.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_database() {
        let h = harness().await;
        h.engine.shutdown().await;
        assert!(!h.engine.database().health_check().await);
    }
}

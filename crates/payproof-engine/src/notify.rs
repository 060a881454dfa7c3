//! # Notification Dispatch
//!
//! Fire-and-forget delivery of template messages.
//!
//! ## Delivery Flow
//! ```text
//! engine operation (already committed)
//!      │
//!      ▼
//! dispatch(message) ── notifications disabled ──► dropped (debug log)
//!      │
//!      ▼
//! tokio::spawn ─► timeout(send_template) ─┬─► Ok        info!
//!      │                                  ├─► Err       warn!, swallowed
//!      │                                  └─► Elapsed   warn!, swallowed
//!      ▼
//! caller continues immediately
//! ```
//!
//! Delivery never reports back to the operation that triggered it. Pending
//! deliveries can be awaited with [`NotificationDispatcher::flush`] on
//! shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NotificationSettings;
use crate::ports::Notifier;

/// A template message addressed to one phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub phone: String,
    pub template: String,
    pub variables: Vec<String>,
}

/// Spawns notification deliveries and keeps their handles.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    settings: NotificationSettings,
    timeout: Duration,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, settings: NotificationSettings, timeout: Duration) -> Self {
        NotificationDispatcher {
            notifier,
            settings,
            timeout,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Returns true if customer messages may go to `phone`.
    pub fn customer_allowed(&self, phone: &str) -> bool {
        self.settings.allows(phone)
    }

    /// Starts delivering `message` in the background.
    ///
    /// Returns false when notifications are disabled and nothing was sent.
    pub async fn dispatch(&self, message: Message) -> bool {
        if !self.settings.enabled {
            debug!(template = %message.template, "Notifications disabled, message dropped");
            return false;
        }

        let notifier = Arc::clone(&self.notifier);
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            let sent = tokio::time::timeout(
                timeout,
                notifier.send_template(&message.phone, &message.template, &message.variables),
            )
            .await;

            match sent {
                Ok(Ok(())) => info!(
                    phone = %message.phone,
                    template = %message.template,
                    "Notification sent"
                ),
                Ok(Err(e)) => warn!(
                    phone = %message.phone,
                    template = %message.template,
                    error = %e,
                    "Notification failed"
                ),
                Err(_) => warn!(
                    phone = %message.phone,
                    template = %message.template,
                    timeout_secs = timeout.as_secs(),
                    "Notification timed out"
                ),
            }
        });

        let mut pending = self.pending.lock().await;
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
        true
    }

    /// Waits for every delivery started so far.
    pub async fn flush(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.pending.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Notification task aborted");
            }
        }
    }
}

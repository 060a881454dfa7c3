//! # Collaborator Ports
//!
//! Traits for everything the engine talks to outside its own database.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ReconciliationEngine                               │
//! │                                                                         │
//! │   OrderSource        OcrProvider       ObjectStorage      Notifier      │
//! │   fetch_order        extract_text      store              send_template │
//! │        │                  │            public_url              │        │
//! │        ▼                  ▼                 ▼                  ▼        │
//! │   store API          OCR service       bucket / CDN       messaging     │
//! │                                                                         │
//! │   Every call is wrapped in tokio::time::timeout by the engine.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations live outside this crate. Tests use in-process fakes.

use async_trait::async_trait;
use thiserror::Error;

use payproof_core::ExternalOrder;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct PortError(pub String);

impl PortError {
    pub fn new(message: impl Into<String>) -> Self {
        PortError(message.into())
    }
}

/// Result type for collaborator calls.
pub type PortResult<T> = Result<T, PortError>;

/// The external store that owns orders.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Fetches an order by number. `None` when the store doesn't know it.
    async fn fetch_order(&self, order_number: &str) -> PortResult<Option<ExternalOrder>>;
}

/// Turns a receipt image into text.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    async fn extract_text(&self, image: &[u8]) -> PortResult<String>;
}

/// Stores receipt images and hands out references to them.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the bytes, returning an opaque location.
    async fn store(&self, bytes: &[u8], file_name: &str) -> PortResult<String>;

    /// Public URL for a location returned by [`ObjectStorage::store`].
    async fn public_url(&self, location: &str) -> PortResult<String>;
}

/// Sends pre-approved message templates.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `template` to `phone` with positional `variables`.
    async fn send_template(
        &self,
        phone: &str,
        template: &str,
        variables: &[String],
    ) -> PortResult<()>;
}

/// Notifier that drops every message.
pub struct NoOpNotifier;

#[async_trait]
impl Notifier for NoOpNotifier {
    async fn send_template(
        &self,
        _phone: &str,
        _template: &str,
        _variables: &[String],
    ) -> PortResult<()> {
        Ok(())
    }
}

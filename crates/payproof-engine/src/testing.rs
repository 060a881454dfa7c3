//! In-process fakes for the collaborator ports.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::notify::Message;
use crate::ports::{Notifier, ObjectStorage, OcrProvider, OrderSource, PortError, PortResult};
use payproof_core::{Customer, ExternalOrder, Money};

/// How a fake answers.
#[derive(Debug, Clone, Copy, Default)]
pub enum Behavior {
    #[default]
    Succeed,
    Fail,
    Hang(Duration),
}

impl Behavior {
    async fn act(self, service: &str) -> PortResult<()> {
        match self {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(PortError::new(format!("{service} unavailable"))),
            Behavior::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        }
    }
}

// =============================================================================
// Order source
// =============================================================================

#[derive(Default)]
pub struct FakeOrderSource {
    orders: Mutex<HashMap<String, ExternalOrder>>,
    pub behavior: Behavior,
}

impl FakeOrderSource {
    pub fn with(behavior: Behavior) -> Self {
        FakeOrderSource {
            behavior,
            ..Default::default()
        }
    }

    pub async fn add(&self, order_number: &str, total: i64, phone: Option<&str>) {
        let order = ExternalOrder {
            order_number: order_number.to_string(),
            total: Money::from_pesos(total),
            currency: Default::default(),
            customer: Customer {
                name: Some("Lucia Gomez".to_string()),
                email: Some("lucia@example.com".to_string()),
                phone: phone.map(str::to_string),
            },
        };
        self.orders.lock().await.insert(order_number.to_string(), order);
    }
}

#[async_trait]
impl OrderSource for FakeOrderSource {
    async fn fetch_order(&self, order_number: &str) -> PortResult<Option<ExternalOrder>> {
        self.behavior.act("store").await?;
        Ok(self.orders.lock().await.get(order_number).cloned())
    }
}

// =============================================================================
// OCR
// =============================================================================

/// Reads the "image" bytes back as UTF-8 text.
#[derive(Default)]
pub struct FakeOcr {
    pub behavior: Behavior,
}

#[async_trait]
impl OcrProvider for FakeOcr {
    async fn extract_text(&self, image: &[u8]) -> PortResult<String> {
        self.behavior.act("ocr").await?;
        Ok(String::from_utf8_lossy(image).into_owned())
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Default)]
pub struct FakeStorage {
    stored: Mutex<Vec<String>>,
    pub behavior: Behavior,
}

impl FakeStorage {
    pub fn with(behavior: Behavior) -> Self {
        FakeStorage {
            behavior,
            ..Default::default()
        }
    }

    pub async fn stored(&self) -> Vec<String> {
        self.stored.lock().await.clone()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn store(&self, _bytes: &[u8], file_name: &str) -> PortResult<String> {
        self.behavior.act("storage").await?;
        let location = format!("receipts/{file_name}");
        self.stored.lock().await.push(location.clone());
        Ok(location)
    }

    async fn public_url(&self, location: &str) -> PortResult<String> {
        Ok(format!("https://cdn.test/{location}"))
    }
}

// =============================================================================
// Notifier
// =============================================================================

#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<Message>>,
    behavior: Behavior,
}

impl FakeNotifier {
    pub fn failing() -> Self {
        FakeNotifier {
            behavior: Behavior::Fail,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        FakeNotifier {
            behavior: Behavior::Hang(delay),
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send_template(
        &self,
        phone: &str,
        template: &str,
        variables: &[String],
    ) -> PortResult<()> {
        self.behavior.act("messaging").await?;
        self.sent.lock().await.push(Message {
            phone: phone.to_string(),
            template: template.to_string(),
            variables: variables.to_vec(),
        });
        Ok(())
    }
}

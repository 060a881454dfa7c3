//! # Engine Configuration
//!
//! Configuration management for the reconciliation engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PAYPROOF_DB_PATH=/var/lib/payproof/payproof.db                     │
//! │     PAYPROOF_ALLOWED_PHONES=5491155550000,5491155550001                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/payproof/payproof.toml (Linux)                           │
//! │     ~/Library/Application Support/com.payproof.payproof/... (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     tolerance 1000, timeout 5s, notifications enabled for everyone     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # payproof.toml
//! [database]
//! path = "/var/lib/payproof/payproof.db"
//! max_connections = 5
//!
//! [reconciliation]
//! tolerance = 1000
//!
//! [external]
//! timeout_secs = 5
//!
//! [notifications]
//! enabled = true
//! allowed_phones = []      # empty = no restriction
//! forward_to_lenders = true
//!
//! [notifications.templates]
//! order_created = "final"
//! payment_complete = "todo_pago"
//! payment_incomplete = "pago_incompleto"
//! lender_review = "revision_financiera_v3"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use payproof_core::{Money, PAYMENT_TOLERANCE};
use payproof_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

/// Where and how the engine stores its data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Reconciliation Settings
// =============================================================================

/// Payment resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    /// Balance band, in pesos, treated as fully paid.
    #[serde(default = "default_tolerance")]
    pub tolerance: i64,
}

fn default_tolerance() -> i64 {
    PAYMENT_TOLERANCE
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        ReconciliationSettings {
            tolerance: default_tolerance(),
        }
    }
}

// =============================================================================
// External Collaborators
// =============================================================================

/// Limits on calls to OCR, storage, messaging and the store API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSettings {
    /// Upper bound for a single collaborator call (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    5
}

impl Default for ExternalSettings {
    fn default() -> Self {
        ExternalSettings {
            timeout_secs: default_timeout(),
        }
    }
}

// =============================================================================
// Notification Settings
// =============================================================================

/// Template ids understood by the messaging provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSettings {
    /// Sent when a new order is synced. Variables: name, order number, total.
    #[serde(default = "default_order_created")]
    pub order_created: String,

    /// Sent after an upload that covers the order. Variables: name, amount.
    #[serde(default = "default_payment_complete")]
    pub payment_complete: String,

    /// Sent after an upload that leaves a balance.
    /// Variables: name, amount, projected balance.
    #[serde(default = "default_payment_incomplete")]
    pub payment_incomplete: String,

    /// Sent to a lender. Variables: public image URL, receipt id.
    #[serde(default = "default_lender_review")]
    pub lender_review: String,
}

fn default_order_created() -> String {
    "final".to_string()
}

fn default_payment_complete() -> String {
    "todo_pago".to_string()
}

fn default_payment_incomplete() -> String {
    "pago_incompleto".to_string()
}

fn default_lender_review() -> String {
    "revision_financiera_v3".to_string()
}

impl Default for TemplateSettings {
    fn default() -> Self {
        TemplateSettings {
            order_created: default_order_created(),
            payment_complete: default_payment_complete(),
            payment_incomplete: default_payment_incomplete(),
            lender_review: default_lender_review(),
        }
    }
}

/// Outbound messaging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Master switch for every outbound message.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Customer phones allowed to receive messages.
    /// Empty means every phone is allowed.
    #[serde(default)]
    pub allowed_phones: Vec<String>,

    /// Forward receipts that mention a lender to that lender.
    #[serde(default = "default_true")]
    pub forward_to_lenders: bool,

    #[serde(default)]
    pub templates: TemplateSettings,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: true,
            allowed_phones: Vec::new(),
            forward_to_lenders: true,
            templates: TemplateSettings::default(),
        }
    }
}

impl NotificationSettings {
    /// Returns true if a message may be sent to `phone`.
    ///
    /// Phones are compared by their digits only, so `+54 9 11 5555-0000`
    /// matches `5491155550000`.
    pub fn allows(&self, phone: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if self.allowed_phones.is_empty() {
            return true;
        }
        let wanted = digits(phone);
        !wanted.is_empty() && self.allowed_phones.iter().any(|p| digits(p) == wanted)
    }
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,

    #[serde(default)]
    pub external: ExternalSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl EngineConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (payproof.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| EngineError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.reconciliation.tolerance < 0 {
            return Err(EngineError::InvalidConfig(
                "tolerance must not be negative".into(),
            ));
        }

        if self.external.timeout_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        let templates = &self.notifications.templates;
        for (name, id) in [
            ("order_created", &templates.order_created),
            ("payment_complete", &templates.payment_complete),
            ("payment_incomplete", &templates.payment_incomplete),
            ("lender_review", &templates.lender_review),
        ] {
            if id.trim().is_empty() {
                return Err(EngineError::InvalidConfig(format!(
                    "template '{}' must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Applies `PAYPROOF_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("PAYPROOF_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(tolerance) = lookup("PAYPROOF_TOLERANCE") {
            match tolerance.parse::<i64>() {
                Ok(t) => self.reconciliation.tolerance = t,
                Err(_) => warn!(value = %tolerance, "Ignoring non-numeric PAYPROOF_TOLERANCE"),
            }
        }

        if let Some(timeout) = lookup("PAYPROOF_EXTERNAL_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.external.timeout_secs = t;
            }
        }

        if let Some(enabled) = lookup("PAYPROOF_NOTIFICATIONS_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.notifications.enabled = true,
                "0" | "false" | "no" | "off" => self.notifications.enabled = false,
                _ => warn!(value = %enabled, "Unknown PAYPROOF_NOTIFICATIONS_ENABLED value"),
            }
        }

        if let Some(phones) = lookup("PAYPROOF_ALLOWED_PHONES") {
            self.notifications.allowed_phones = phones
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "payproof", "payproof")
            .map(|dirs| dirs.config_dir().join("payproof.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Tolerance band as Money.
    pub fn tolerance(&self) -> Money {
        Money::from_pesos(self.reconciliation.tolerance)
    }

    /// Timeout for a single collaborator call.
    pub fn external_timeout(&self) -> Duration {
        Duration::from_secs(self.external.timeout_secs)
    }

    /// Database file, falling back to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database.path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("com", "payproof", "payproof")
                .map(|dirs| dirs.data_dir().join("payproof.db"))
                .unwrap_or_else(|| PathBuf::from("payproof.db"))
        })
    }

    /// Pool configuration for [`payproof_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.reconciliation.tolerance, 1000);
        assert_eq!(config.external.timeout_secs, 5);
        assert!(config.notifications.enabled);
        assert!(config.notifications.allowed_phones.is_empty());
        assert_eq!(config.notifications.templates.payment_complete, "todo_pago");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.reconciliation.tolerance = -1;
        assert!(config.validate().is_err());

        config.reconciliation.tolerance = 0;
        config.external.timeout_secs = 0;
        assert!(config.validate().is_err());

        config.external.timeout_secs = 3;
        config.notifications.templates.lender_review = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [reconciliation]
            tolerance = 500

            [notifications]
            allowed_phones = ["+54 9 11 5555-0000"]
            "#,
        )
        .unwrap();

        assert_eq!(config.tolerance(), Money::from_pesos(500));
        assert_eq!(config.external.timeout_secs, 5);
        assert!(config.notifications.forward_to_lenders);
        assert_eq!(config.notifications.templates.order_created, "final");
    }

    #[test]
    fn test_allow_list_compares_digits() {
        let mut settings = NotificationSettings::default();
        assert!(settings.allows("5491100000000"));

        settings.allowed_phones = vec!["+54 9 11 5555-0000".to_string()];
        assert!(settings.allows("5491155550000"));
        assert!(!settings.allows("5491155550001"));
        assert!(!settings.allows(""));

        settings.allowed_phones.clear();
        settings.enabled = false;
        assert!(!settings.allows("5491155550000"));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("PAYPROOF_DB_PATH", "/tmp/pp.db"),
            ("PAYPROOF_TOLERANCE", "250"),
            ("PAYPROOF_NOTIFICATIONS_ENABLED", "off"),
            ("PAYPROOF_ALLOWED_PHONES", "111, ,222"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database_path(), PathBuf::from("/tmp/pp.db"));
        assert_eq!(config.reconciliation.tolerance, 250);
        assert!(!config.notifications.enabled);
        assert_eq!(config.notifications.allowed_phones, vec!["111", "222"]);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!(
            "payproof-config-{}.toml",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let mut config = EngineConfig::default();
        config.external.timeout_secs = 9;
        config.save(Some(path.clone())).unwrap();

        let loaded = EngineConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.external.timeout_secs, 9);
        let _ = std::fs::remove_file(&path);
    }
}

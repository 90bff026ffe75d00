//! Shipping configuration.
//!
//! Loaded from TOML or JSON (chosen by file extension). Every section has
//! defaults, so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::carrier::{Carrier, CarrierRegistry};
use crate::error::{ExternalService, ExternalServiceError, ShippingError};

/// Which environment the remote services run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    #[default]
    Test,
    Production,
}

impl ServiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceMode::Test => "test",
            ServiceMode::Production => "production",
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingConfig {
    #[serde(default)]
    pub mode: ServiceMode,

    /// Country code to display name.
    #[serde(default = "default_countries")]
    pub supported_countries: BTreeMap<String, String>,

    /// Weight units a profile may be saved with.
    #[serde(default = "default_weight_units")]
    pub weight_units: Vec<String>,

    /// Length units a profile may be saved with.
    #[serde(default = "default_length_units")]
    pub length_units: Vec<String>,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub purchase: PurchaseConfig,

    /// Replaces the built-in carrier table when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carriers: Option<BTreeMap<String, Carrier>>,
}

fn default_countries() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("CA".to_string(), "Canada".to_string()),
        ("US".to_string(), "United States".to_string()),
    ])
}

fn default_weight_units() -> Vec<String> {
    vec!["lb".to_string(), "kg".to_string()]
}

fn default_length_units() -> Vec<String> {
    vec!["in".to_string(), "cm".to_string()]
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::default(),
            supported_countries: default_countries(),
            weight_units: default_weight_units(),
            length_units: default_length_units(),
            timeouts: TimeoutConfig::default(),
            purchase: PurchaseConfig::default(),
            carriers: None,
        }
    }
}

impl ShippingConfig {
    /// Load config from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShippingError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShippingError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_toml(&content)
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ShippingError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ShippingError> {
        toml::to_string_pretty(self).map_err(|e| ShippingError::Serialization(e.to_string()))
    }

    /// The carrier registry this config describes.
    pub fn carrier_registry(&self) -> Arc<CarrierRegistry> {
        match &self.carriers {
            Some(carriers) => Arc::new(CarrierRegistry::new(carriers.clone())),
            None => Arc::new(CarrierRegistry::builtin().clone()),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts::from(&self.timeouts)
    }
}

/// Per-service deadlines in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeoutConfig {
    #[serde(default = "default_shipment_ms")]
    pub shipment_ms: u64,
    #[serde(default = "default_address_ms")]
    pub address_ms: u64,
    #[serde(default = "default_billing_ms")]
    pub billing_ms: u64,
}

fn default_shipment_ms() -> u64 {
    20_000
}

fn default_address_ms() -> u64 {
    10_000
}

fn default_billing_ms() -> u64 {
    15_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            shipment_ms: default_shipment_ms(),
            address_ms: default_address_ms(),
            billing_ms: default_billing_ms(),
        }
    }
}

/// Label purchase settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseConfig {
    /// Labels bought at once; keep within the carrier API's rate limit.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// Deadlines applied to every remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub shipment: Duration,
    pub address: Duration,
    pub billing: Duration,
}

impl Timeouts {
    /// One deadline for every service.
    pub fn uniform(total: Duration) -> Self {
        Self {
            shipment: total,
            address: total,
            billing: total,
        }
    }

    pub fn for_service(&self, service: ExternalService) -> Duration {
        match service {
            ExternalService::Shipment => self.shipment,
            ExternalService::AddressVerification => self.address,
            ExternalService::Billing => self.billing,
        }
    }

    /// Run `call` under the deadline for `service`.
    ///
    /// Expiry surfaces as [`ExternalServiceError::Timeout`]; the call is not
    /// retried.
    pub async fn run<T, F>(&self, service: ExternalService, call: F) -> Result<T, ExternalServiceError>
    where
        F: Future<Output = Result<T, ExternalServiceError>>,
    {
        let limit = self.for_service(service);
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(service = %service, timeout_ms = limit.as_millis() as u64, "external call timed out");
                Err(ExternalServiceError::Timeout(limit))
            }
        }
    }
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            shipment: Duration::from_millis(config.shipment_ms),
            address: Duration::from_millis(config.address_ms),
            billing: Duration::from_millis(config.billing_ms),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

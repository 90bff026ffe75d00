//! Shipping error types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// The remote collaborator a failed call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternalService {
    /// Shipment quote/purchase service.
    Shipment,
    /// Address verification service.
    AddressVerification,
    /// Billing/payment charge.
    Billing,
}

impl ExternalService {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalService::Shipment => "shipment",
            ExternalService::AddressVerification => "address_verification",
            ExternalService::Billing => "billing",
        }
    }
}

impl fmt::Display for ExternalService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors reported by a remote collaborator.
///
/// None of these are retried by this crate; `is_retryable` tells the caller
/// whether trying again could succeed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExternalServiceError {
    /// The call did not complete within its deadline.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never reached the service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be understood.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ExternalServiceError {
    /// Whether a retry by the caller may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExternalServiceError::Timeout(_) | ExternalServiceError::Transport(_) => true,
            ExternalServiceError::Http { status, .. } => *status == 429 || *status >= 500,
            ExternalServiceError::Decode(_) => false,
        }
    }
}

/// Errors that can occur in shipping operations.
#[derive(Error, Debug, Clone)]
pub enum ShippingError {
    /// A unit outside the converter's table.
    #[error("Unsupported unit \"{unit}\" for \"{family}\" converter. Supported units are: {supported}.")]
    InvalidUnit {
        unit: String,
        family: &'static str,
        supported: String,
    },

    /// A value that is not a finite number.
    #[error("Value to format must be numeric: {0}")]
    InvalidValue(String),

    /// Field-level validation failures, all fields at once.
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    /// A configured option had no matching carrier quote.
    #[error("No {carrier} quote available for {option}")]
    CarrierQuoteUnavailable { option: String, carrier: String },

    /// A remote call failed.
    #[error("{service} service error: {source}")]
    ExternalService {
        service: ExternalService,
        #[source]
        source: ExternalServiceError,
    },

    /// At least one unit of a batch purchase failed.
    #[error("Purchased {purchased} of {total} shipping labels; {} failed", failures.len())]
    PartialPurchaseFailure {
        purchased: usize,
        total: usize,
        failures: Vec<String>,
    },

    /// Charging the merchant failed after every label was bought.
    #[error("Billing failed for order {order_id} ({amount} minor units): {source}")]
    BillingFailure {
        order_id: String,
        amount: i64,
        /// Whether the order had already moved to ready-to-ship.
        status_advanced: bool,
        #[source]
        source: ExternalServiceError,
    },

    /// The merchant has no default payment method on file.
    #[error("No default payment method for shop {0}")]
    NoPaymentMethod(String),

    /// Labels were priced in a currency other than the one the shop is
    /// billed in.
    #[error("Shipping labels are priced in {found} but shop is billed in {expected}")]
    ChargeCurrencyMismatch { expected: String, found: String },

    /// The order has no line that needs a label.
    #[error("Order {0} has nothing to ship")]
    NothingToShip(String),

    /// Neither the profile nor its shop has a dispatch address.
    #[error("No dispatch address for shipping profile {0}")]
    MissingDispatchAddress(String),

    /// A line item resolves to no shipping profile.
    #[error("No shipping profile for line item {0}")]
    MissingShippingProfile(String),

    /// A line item has no chosen shipping option.
    #[error("No shipping option chosen for line item {0}")]
    MissingShippingOption(String),

    /// A profile without a parcel weight cannot be rated.
    #[error("Shipping profile {0} has no parcel weight")]
    MissingParcel(String),

    /// A carrier key absent from the registry.
    #[error("Unknown carrier: {0}")]
    UnknownCarrier(String),

    /// The service returned a shipment without a postage label.
    #[error("Shipment {0} was created without a postage label")]
    LabelNotPurchased(String),

    /// A label was bought but its price could not be determined.
    #[error("Shipment {0} was purchased but no rate amount could be resolved")]
    LabelUnpriced(String),

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration failure.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ShippingError {
    /// Wrap a remote failure with the service it came from.
    pub fn external(service: ExternalService, source: ExternalServiceError) -> Self {
        ShippingError::ExternalService { service, source }
    }

    /// Whether the caller may retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            ShippingError::ExternalService { source, .. } => source.is_retryable(),
            ShippingError::BillingFailure { source, .. } => source.is_retryable(),
            ShippingError::PartialPurchaseFailure { .. } => true,
            _ => false,
        }
    }

    /// Field errors, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ShippingError::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ShippingError {
    fn from(e: serde_json::Error) -> Self {
        ShippingError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for ShippingError {
    fn from(e: toml::de::Error) -> Self {
        ShippingError::Config(e.to_string())
    }
}

impl From<ValidationErrors> for ShippingError {
    fn from(errors: ValidationErrors) -> Self {
        ShippingError::ValidationFailed(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let err = ShippingError::external(
            ExternalService::Shipment,
            ExternalServiceError::Timeout(Duration::from_secs(5)),
        );
        assert!(err.is_retryable());
        assert!(err.to_string().starts_with("shipment service error"));
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = ExternalServiceError::Http {
            status: 422,
            body: "bad parcel".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(ExternalServiceError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_invalid_unit_message() {
        let err = ShippingError::InvalidUnit {
            unit: "mm".to_string(),
            family: "Length",
            supported: "in,cm".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unsupported unit \"mm\" for \"Length\" converter. Supported units are: in,cm."
        );
    }
}

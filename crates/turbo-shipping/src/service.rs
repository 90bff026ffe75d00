//! Contracts for the remote collaborators.
//!
//! The shipment service quotes and buys labels, the address verifier checks
//! postal addresses, and the billing gateway charges the merchant. This crate
//! only consumes them; wire types follow the shipment service's JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::address::CarrierAddress;
use crate::error::ExternalServiceError;
use crate::ids::{PaymentMethodId, ShopId};

/// Parcel as sent to the shipment service: ounces and inches.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Parcel {
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
}

impl Parcel {
    pub fn has_dimensions(&self) -> bool {
        self.length.is_some() && self.width.is_some() && self.height.is_some()
    }
}

/// Extra shipment options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipmentOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// A quote request, or a purchase when `service` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShipmentRequest {
    pub from_address: CarrierAddress,
    pub to_address: CarrierAddress,
    pub parcel: Parcel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_accounts: Option<Vec<String>>,
    /// Naming a service makes the shipment service buy the label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ShipmentOptions>,
}

impl ShipmentRequest {
    pub fn new(from_address: CarrierAddress, to_address: CarrierAddress, parcel: Parcel) -> Self {
        Self {
            from_address,
            to_address,
            parcel,
            ..Self::default()
        }
    }

    pub fn with_carrier_accounts(mut self, accounts: Vec<String>) -> Self {
        self.carrier_accounts = Some(accounts);
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.options = Some(ShipmentOptions {
            currency: Some(currency.into()),
        });
        self
    }

    pub fn is_purchase(&self) -> bool {
        self.service.is_some()
    }
}

/// A priced quote for one carrier service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierRate {
    pub id: String,
    pub carrier: String,
    pub service: String,
    /// Price in major units, as a decimal string ("10.50").
    pub rate: String,
    pub currency: String,
    #[serde(default)]
    pub delivery_days: Option<u32>,
}

impl CarrierRate {
    /// Case-insensitive `"<service>-<carrier>"` match key.
    pub fn match_key(&self) -> String {
        match_key(&self.service, &self.carrier)
    }
}

/// Normalised key used to pair configured options with quotes.
pub fn match_key(service: &str, carrier: &str) -> String {
    format!("{}-{}", service, carrier).to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostageLabel {
    pub label_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tracker {
    #[serde(default)]
    pub id: Option<String>,
    pub tracking_code: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Carrier-specific tracking events.
    #[serde(default)]
    pub tracking_details: Option<serde_json::Value>,
}

/// Diagnostic attached to a shipment, e.g. a carrier rejecting a parcel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub carrier: String,
    pub message: String,
}

impl CarrierMessage {
    pub fn is_rate_error(&self) -> bool {
        self.kind == "rate_error"
    }
}

/// The shipment service's answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: String,
    #[serde(default)]
    pub rates: Vec<CarrierRate>,
    /// The rate a purchase was made at.
    #[serde(default)]
    pub selected_rate: Option<CarrierRate>,
    #[serde(default)]
    pub postage_label: Option<PostageLabel>,
    #[serde(default)]
    pub tracker: Option<Tracker>,
    #[serde(default)]
    pub messages: Vec<CarrierMessage>,
}

/// Quotes and buys shipments.
#[async_trait]
pub trait ShipmentService: Send + Sync {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<Shipment, ExternalServiceError>;
}

/// An address submitted for verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddressVerificationRequest {
    #[serde(flatten)]
    pub address: CarrierAddress,
    pub verify: bool,
    pub mode: String,
    pub residential: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(default)]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Verification {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Verifications {
    #[serde(default)]
    pub delivery: Option<Verification>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VerifiedAddress {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub verifications: Verifications,
}

impl VerifiedAddress {
    /// Delivery verification errors, if any.
    pub fn delivery_errors(&self) -> &[FieldError] {
        self.verifications
            .delivery
            .as_ref()
            .map(|d| d.errors.as_slice())
            .unwrap_or(&[])
    }
}

/// Validates and corrects postal addresses.
#[async_trait]
pub trait AddressVerifier: Send + Sync {
    async fn verify(&self, request: AddressVerificationRequest) -> Result<VerifiedAddress, ExternalServiceError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeOptions {
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeReceipt {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Charges a merchant's stored payment method.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn default_payment_method(&self, shop: &ShopId) -> Result<Option<PaymentMethodId>, ExternalServiceError>;

    async fn charge(
        &self,
        amount: i64,
        payment_method: &PaymentMethodId,
        options: ChargeOptions,
    ) -> Result<ChargeReceipt, ExternalServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_key_is_case_insensitive() {
        assert_eq!(match_key("Ground", "UPS"), "ground-ups");
        assert_eq!(match_key("GROUND", "ups"), match_key("ground", "UPS"));
    }

    #[test]
    fn test_quote_request_omits_purchase_fields() {
        let request = ShipmentRequest::new(
            CarrierAddress::postal_code_only("10001"),
            CarrierAddress::postal_code_only("10001"),
            Parcel {
                weight: 16.0,
                ..Parcel::default()
            },
        );
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("service").is_none());
        assert!(json.get("carrier_accounts").is_none());
        assert!(!request.is_purchase());
        assert!(request.with_service("Ground").is_purchase());
    }

    #[test]
    fn test_shipment_deserializes_sparse_response() {
        let shipment: Shipment = serde_json::from_value(serde_json::json!({
            "id": "shp_1",
            "rates": [{
                "id": "rate_1", "carrier": "UPS", "service": "Ground",
                "rate": "10.50", "currency": "USD", "delivery_days": 5
            }],
            "messages": [{ "type": "rate_error", "carrier": "USPS", "message": "nope" }]
        }))
        .unwrap();
        assert_eq!(shipment.rates[0].match_key(), "ground-ups");
        assert!(shipment.messages[0].is_rate_error());
        assert!(shipment.postage_label.is_none());
    }

    #[test]
    fn test_verification_request_flattens_address() {
        let request = AddressVerificationRequest {
            address: CarrierAddress::postal_code_only("90210"),
            verify: true,
            mode: "test".to_string(),
            residential: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["zip"], "90210");
        assert_eq!(json["verify"], true);
    }
}

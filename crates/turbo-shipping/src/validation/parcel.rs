//! Parcel dimension and weight validation.
//!
//! Structural rules run locally. When an origin postal code is known, a
//! zip-to-same-zip quote is also requested so carriers can report their own
//! limits (maximum length, girth, ...). That check is advisory: if the
//! service is unreachable or its messages don't parse, validation proceeds
//! on the structural rules alone.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::address::CarrierAddress;
use crate::config::Timeouts;
use crate::error::{ExternalService, ShippingError};
use crate::profile::ShippingProfile;
use crate::service::{CarrierMessage, Parcel, ShipmentRequest, ShipmentService};
use crate::units::{Length, Weight, LENGTH, WEIGHT};
use crate::validation::ValidationErrors;

/// Smallest accepted weight or dimension (inclusive).
pub const PARCEL_MIN: f64 = 0.1;
/// Largest accepted weight or dimension (inclusive).
pub const PARCEL_MAX: f64 = 999_999.0;

const DIMENSIONS: [&str; 3] = ["length", "width", "height"];
const PARCEL_FIELDS: [&str; 4] = ["weight", "length", "width", "height"];

/// A form value that may arrive as a number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(f64),
    Text(String),
}

impl NumericInput {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            NumericInput::Number(n) if n.is_finite() => Some(*n),
            NumericInput::Number(_) => None,
            NumericInput::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, NumericInput::Text(s) if s.trim().is_empty())
    }
}

impl From<f64> for NumericInput {
    fn from(n: f64) -> Self {
        NumericInput::Number(n)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        NumericInput::Text(s.to_string())
    }
}

/// A candidate parcel as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelInput {
    #[serde(default)]
    pub weight: Option<NumericInput>,
    #[serde(default)]
    pub weight_unit: Option<String>,
    #[serde(default)]
    pub length: Option<NumericInput>,
    #[serde(default)]
    pub width: Option<NumericInput>,
    #[serde(default)]
    pub height: Option<NumericInput>,
    #[serde(default)]
    pub length_unit: Option<String>,
}

impl ParcelInput {
    pub fn weight(weight: impl Into<NumericInput>, unit: impl Into<String>) -> Self {
        Self {
            weight: Some(weight.into()),
            weight_unit: Some(unit.into()),
            ..Self::default()
        }
    }

    pub fn with_dimensions(
        mut self,
        length: impl Into<NumericInput>,
        width: impl Into<NumericInput>,
        height: impl Into<NumericInput>,
        unit: impl Into<String>,
    ) -> Self {
        self.length = Some(length.into());
        self.width = Some(width.into());
        self.height = Some(height.into());
        self.length_unit = Some(unit.into());
        self
    }

    /// The parcel a saved profile describes.
    pub fn from_profile(profile: &ShippingProfile) -> Self {
        let dims = profile.length.is_some() || profile.width.is_some() || profile.height.is_some();
        Self {
            weight: profile.weight.map(NumericInput::Number),
            weight_unit: Some(profile.weight_unit.clone()),
            length: profile.length.map(NumericInput::Number),
            width: profile.width.map(NumericInput::Number),
            height: profile.height.map(NumericInput::Number),
            length_unit: dims.then(|| profile.length_unit.clone()),
        }
    }

    fn field(&self, name: &str) -> Option<&NumericInput> {
        let value = match name {
            "weight" => self.weight.as_ref(),
            "length" => self.length.as_ref(),
            "width" => self.width.as_ref(),
            "height" => self.height.as_ref(),
            _ => None,
        };
        value.filter(|v| !v.is_blank())
    }

    fn present(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Shipment-service parcel (ounces, inches). Assumes structural
    /// validation passed.
    fn to_parcel(&self) -> Result<Parcel, ShippingError> {
        let number = |name: &str| -> Result<f64, ShippingError> {
            self.field(name)
                .and_then(NumericInput::as_number)
                .ok_or_else(|| ShippingError::InvalidValue(name.to_string()))
        };
        let weight_unit = self.weight_unit.as_deref().unwrap_or(WEIGHT.base);
        let mut parcel = Parcel {
            weight: Weight::to_oz(number("weight")?, weight_unit)?,
            ..Parcel::default()
        };
        if self.present("length") {
            let unit = self.length_unit.as_deref().unwrap_or(LENGTH.base);
            parcel.length = Some(Length::to_in(number("length")?, unit)?);
            parcel.width = Some(Length::to_in(number("width")?, unit)?);
            parcel.height = Some(Length::to_in(number("height")?, unit)?);
        }
        Ok(parcel)
    }
}

/// Validates parcels, optionally against live carrier constraints.
#[derive(Clone, Default)]
pub struct ParcelValidator {
    service: Option<Arc<dyn ShipmentService>>,
    timeouts: Timeouts,
}

impl ParcelValidator {
    /// Structural rules only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural rules plus carrier-reported limits.
    pub fn with_service(service: Arc<dyn ShipmentService>, timeouts: Timeouts) -> Self {
        Self {
            service: Some(service),
            timeouts,
        }
    }

    /// Check the structural rules, collecting every failure.
    pub fn validate(&self, input: &ParcelInput) -> Result<(), ValidationErrors> {
        structural_errors(input).into_result()
    }

    /// Structural rules, then, given an origin postal code, the carriers'
    /// own limits.
    #[instrument(skip(self, input))]
    pub async fn validate_live(
        &self,
        input: &ParcelInput,
        origin_postal_code: Option<&str>,
    ) -> Result<(), ValidationErrors> {
        let mut errors = structural_errors(input);
        if !errors.is_empty() {
            return Err(errors);
        }

        if let (Some(origin), Some(service)) = (origin_postal_code, self.service.as_ref()) {
            errors.merge(self.carrier_errors(service.as_ref(), input, origin).await);
        }

        errors.into_result()
    }

    async fn carrier_errors(
        &self,
        service: &dyn ShipmentService,
        input: &ParcelInput,
        origin: &str,
    ) -> ValidationErrors {
        let parcel = match input.to_parcel() {
            Ok(parcel) => parcel,
            Err(e) => {
                debug!(error = %e, "skipping carrier parcel check");
                return ValidationErrors::new();
            }
        };

        let request = ShipmentRequest::new(
            CarrierAddress::postal_code_only(origin),
            CarrierAddress::postal_code_only(origin),
            parcel,
        );

        match self
            .timeouts
            .run(ExternalService::Shipment, service.create_shipment(request))
            .await
        {
            Ok(shipment) => parse_parcel_messages(&shipment.messages),
            Err(e) => {
                warn!(error = %e, "carrier parcel check unavailable");
                ValidationErrors::new()
            }
        }
    }
}

pub(super) fn structural_errors(input: &ParcelInput) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    match input.field("weight") {
        None => errors.add("weight", "The weight field is required."),
        Some(value) => check_number(&mut errors, "weight", value),
    }

    for field in DIMENSIONS {
        let others: Vec<&str> = DIMENSIONS.iter().copied().filter(|f| *f != field).collect();
        match input.field(field) {
            None if others.iter().any(|o| input.present(o)) => errors.add(
                field,
                format!("The {} field is required when {} is present.", field, others.join(" / ")),
            ),
            None => {}
            Some(value) => check_number(&mut errors, field, value),
        }
    }

    let weight_unit = input.weight_unit.as_deref().filter(|u| !u.trim().is_empty());
    match weight_unit {
        None if input.present("weight") => {
            errors.add("weight_unit", "The weight unit field is required when weight is present.")
        }
        Some(unit) if !WEIGHT.supports(unit) => errors.add("weight_unit", "The selected weight unit is invalid."),
        _ => {}
    }

    let length_unit = input.length_unit.as_deref().filter(|u| !u.trim().is_empty());
    match length_unit {
        None if DIMENSIONS.iter().any(|d| input.present(d)) => errors.add(
            "length_unit",
            "The length unit field is required when height / width / length is present.",
        ),
        Some(unit) if !LENGTH.supports(unit) => errors.add("length_unit", "The selected length unit is invalid."),
        _ => {}
    }

    errors
}

fn check_number(errors: &mut ValidationErrors, field: &str, value: &NumericInput) {
    match value.as_number() {
        None => errors.add(field, format!("The {} field must be a number.", field)),
        Some(n) if n < PARCEL_MIN => errors.add(field, format!("The {} field must be at least {}.", field, PARCEL_MIN)),
        Some(n) if n > PARCEL_MAX => {
            errors.add(field, format!("The {} field must not be greater than {}.", field, PARCEL_MAX))
        }
        Some(_) => {}
    }
}

/// Turn carrier `rate_error` messages about parcel fields into field errors.
///
/// Carrier text is matched by pattern, so this is best-effort: messages that
/// don't name a known parcel field are dropped.
pub(crate) fn parse_parcel_messages(messages: &[CarrierMessage]) -> ValidationErrors {
    const MARKER: &str = "shipment.parcel.";
    const LTE: &str = "is less than or equal to";

    let mut errors = ValidationErrors::new();

    for message in messages.iter().filter(|m| m.is_rate_error()) {
        let Some((_, rest)) = message.message.split_once(MARKER) else {
            continue;
        };
        let field: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !PARCEL_FIELDS.contains(&field.as_str()) {
            debug!(carrier = %message.carrier, %field, "ignoring unrecognised parcel message");
            continue;
        }

        let content = match rest.split_once(LTE) {
            Some((_, tail)) => {
                let tail = tail.trim_start_matches(|c: char| c.is_whitespace());
                let max = tail.split(" and").next().unwrap_or(tail).trim().trim_end_matches('.');
                if max.is_empty() {
                    message.message.clone()
                } else {
                    format!("The {} field must not be greater than {}.", field, max)
                }
            }
            None => message.message.clone(),
        };

        errors.add(field, format!("{}: {}", message.carrier, content));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalServiceError;
    use crate::service::Shipment;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn rate_error(carrier: &str, message: &str) -> CarrierMessage {
        CarrierMessage {
            kind: "rate_error".to_string(),
            carrier: carrier.to_string(),
            message: message.to_string(),
        }
    }

    struct MessagesService {
        messages: Vec<CarrierMessage>,
        requests: Mutex<Vec<ShipmentRequest>>,
    }

    #[async_trait]
    impl ShipmentService for MessagesService {
        async fn create_shipment(&self, request: ShipmentRequest) -> Result<Shipment, ExternalServiceError> {
            self.requests.lock().unwrap().push(request);
            Ok(Shipment {
                id: "shp_check".to_string(),
                rates: Vec::new(),
                selected_rate: None,
                postage_label: None,
                tracker: None,
                messages: self.messages.clone(),
            })
        }
    }

    struct DownService;

    #[async_trait]
    impl ShipmentService for DownService {
        async fn create_shipment(&self, _request: ShipmentRequest) -> Result<Shipment, ExternalServiceError> {
            Err(ExternalServiceError::Transport("connection refused".to_string()))
        }
    }

    #[test]
    fn test_weight_bounds() {
        let validator = ParcelValidator::new();
        assert!(validator.validate(&ParcelInput::weight(0.0, "lb")).is_err());
        assert!(validator.validate(&ParcelInput::weight(1_000_000.0, "lb")).is_err());
        assert!(validator.validate(&ParcelInput::weight(0.1, "lb")).is_ok());
        assert!(validator.validate(&ParcelInput::weight(999_999.0, "lb")).is_ok());
    }

    #[test]
    fn test_weight_required_and_numeric() {
        let validator = ParcelValidator::new();
        let errors = validator.validate(&ParcelInput::default()).unwrap_err();
        assert_eq!(errors.first("weight"), Some("The weight field is required."));

        let errors = validator.validate(&ParcelInput::weight("heavy", "lb")).unwrap_err();
        assert_eq!(errors.first("weight"), Some("The weight field must be a number."));

        assert!(validator.validate(&ParcelInput::weight("2.5", "kg")).is_ok());
    }

    #[test]
    fn test_dimensions_required_together() {
        let input = ParcelInput {
            length: Some(10.0.into()),
            length_unit: Some("in".to_string()),
            ..ParcelInput::weight(1.0, "lb")
        };
        let errors = ParcelValidator::new().validate(&input).unwrap_err();
        assert!(errors.has("width"));
        assert!(errors.has("height"));
        assert!(!errors.has("length"));
        assert_eq!(
            errors.first("height"),
            Some("The height field is required when length / width is present.")
        );
    }

    #[test]
    fn test_length_unit_required_with_dimensions() {
        let mut input = ParcelInput::weight(1.0, "lb").with_dimensions(1.0, 2.0, 3.0, "in");
        input.length_unit = None;
        let errors = ParcelValidator::new().validate(&input).unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["length_unit"]);
    }

    #[test]
    fn test_collects_all_fields() {
        let input = ParcelInput::weight(0.0, "stone").with_dimensions(0.0, "x", 2_000_000.0, "mm");
        let errors = ParcelValidator::new().validate(&input).unwrap_err();
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["height", "length", "length_unit", "weight", "weight_unit", "width"]
        );
    }

    #[test]
    fn test_from_profile() {
        let profile = ShippingProfile::one_off("shop".into())
            .with_weight(3.0, "kg")
            .with_dimensions(10.0, 10.0, 10.0, "cm");
        assert!(ParcelValidator::new().validate(&ParcelInput::from_profile(&profile)).is_ok());
    }

    #[test]
    fn test_parse_less_than_or_equal_message() {
        let errors = parse_parcel_messages(&[rate_error(
            "USPS",
            "shipment.parcel.length: ensure this value is less than or equal to 108 and greater than 0",
        )]);
        assert_eq!(
            errors.first("length"),
            Some("USPS: The length field must not be greater than 108.")
        );
    }

    #[test]
    fn test_parse_keeps_other_messages_verbatim() {
        let text = "shipment.parcel.weight: weight exceeds service maximum";
        let errors = parse_parcel_messages(&[rate_error("UPS", text)]);
        assert_eq!(errors.first("weight"), Some(format!("UPS: {}", text).as_str()));
    }

    #[test]
    fn test_parse_ignores_unrelated_messages() {
        let errors = parse_parcel_messages(&[
            rate_error("UPS", "Unable to rate this shipment"),
            rate_error("UPS", "shipment.parcel.predefined_package: unknown"),
            CarrierMessage {
                kind: "info".to_string(),
                carrier: "UPS".to_string(),
                message: "shipment.parcel.weight: ensure this value is less than or equal to 5".to_string(),
            },
        ]);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_live_check_attaches_carrier_limits() {
        let service = Arc::new(MessagesService {
            messages: vec![rate_error(
                "FedEx",
                "shipment.parcel.height: ensure this value is less than or equal to 70.",
            )],
            requests: Mutex::new(Vec::new()),
        });
        let validator = ParcelValidator::with_service(service.clone(), Timeouts::default());
        let input = ParcelInput::weight(1.0, "lb").with_dimensions(10.0, 10.0, 90.0, "in");

        let errors = validator.validate_live(&input, Some("10001")).await.unwrap_err();
        assert_eq!(
            errors.first("height"),
            Some("FedEx: The height field must not be greater than 70.")
        );

        let requests = service.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].from_address, CarrierAddress::postal_code_only("10001"));
        assert_eq!(requests[0].to_address, CarrierAddress::postal_code_only("10001"));
        assert_eq!(requests[0].parcel.weight, 16.0);
        assert!(requests[0].service.is_none());
    }

    #[tokio::test]
    async fn test_live_check_is_advisory() {
        let validator = ParcelValidator::with_service(Arc::new(DownService), Timeouts::default());
        let input = ParcelInput::weight(1.0, "lb");
        assert!(validator.validate_live(&input, Some("10001")).await.is_ok());
    }

    #[tokio::test]
    async fn test_live_check_skipped_without_origin() {
        let service = Arc::new(MessagesService {
            messages: Vec::new(),
            requests: Mutex::new(Vec::new()),
        });
        let validator = ParcelValidator::with_service(service.clone(), Timeouts::default());
        assert!(validator.validate_live(&ParcelInput::weight(1.0, "lb"), None).await.is_ok());
        assert!(service.requests.lock().unwrap().is_empty());
    }
}

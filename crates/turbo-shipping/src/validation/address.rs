//! Postal address validation.
//!
//! Local field rules are merged with the verification service's delivery
//! errors. Verification field names are the carrier's (`street1`, `zip`);
//! they are mapped back onto [`ShippingAddress`] fields before being
//! reported.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::address::{CarrierAddress, ShippingAddress};
use crate::config::{ServiceMode, Timeouts};
use crate::error::{ExternalService, ShippingError};
use crate::service::{AddressVerificationRequest, AddressVerifier, FieldError};
use crate::validation::ValidationErrors;

const MAX_LEN: usize = 255;

/// Validates delivery and dispatch addresses.
#[derive(Clone)]
pub struct AddressValidator {
    verifier: Option<Arc<dyn AddressVerifier>>,
    timeouts: Timeouts,
    mode: ServiceMode,
    require_phone: bool,
}

impl AddressValidator {
    /// Field rules plus live verification.
    pub fn new(verifier: Arc<dyn AddressVerifier>, timeouts: Timeouts, mode: ServiceMode) -> Self {
        Self {
            verifier: Some(verifier),
            timeouts,
            mode,
            require_phone: false,
        }
    }

    /// Field rules only.
    pub fn offline() -> Self {
        Self {
            verifier: None,
            timeouts: Timeouts::default(),
            mode: ServiceMode::default(),
            require_phone: false,
        }
    }

    /// Dispatch addresses also need a phone number; carriers refuse to
    /// print labels without one.
    pub fn for_dispatch(mut self) -> Self {
        self.require_phone = true;
        self
    }

    /// Validate `address`, returning every field problem at once.
    ///
    /// Field problems come back as [`ShippingError::ValidationFailed`]; a
    /// failing verification service as [`ShippingError::ExternalService`].
    #[instrument(skip(self, address), fields(country = %address.country))]
    pub async fn validate(&self, address: &ShippingAddress) -> Result<(), ShippingError> {
        let mut errors = self.field_errors(address);

        if let Some(verifier) = &self.verifier {
            let request = AddressVerificationRequest {
                address: CarrierAddress::recipient(address),
                verify: true,
                mode: self.mode.as_str().to_string(),
                residential: true,
            };
            let verified = self
                .timeouts
                .run(ExternalService::AddressVerification, verifier.verify(request))
                .await
                .map_err(|e| ShippingError::external(ExternalService::AddressVerification, e))?;

            errors.merge(verification_errors(verified.delivery_errors()));
        }

        errors.into_result().map_err(ShippingError::from)
    }

    fn field_errors(&self, address: &ShippingAddress) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        let required = [
            ("name", "address name", address.name.as_str()),
            ("line1", "address line 1", address.line1.as_str()),
            ("city", "address city", address.city.as_str()),
            ("state", "address state", address.state.as_str()),
            ("postal_code", "address postal code", address.postal_code.as_str()),
            ("country", "address country", address.country.as_str()),
        ];
        for (field, label, value) in required {
            if value.trim().is_empty() {
                errors.add(field, format!("The {} field is required.", label));
            }
        }

        if address.name.chars().count() > MAX_LEN {
            errors.add(
                "name",
                format!("The address name field must not be greater than {} characters.", MAX_LEN),
            );
        }

        if self.require_phone {
            match address.phone.as_deref().map(str::trim) {
                None | Some("") => errors.add("phone", "The phone field is required."),
                Some(phone) if phone.chars().count() > MAX_LEN => errors.add(
                    "phone",
                    format!("The phone field must not be greater than {} characters.", MAX_LEN),
                ),
                Some(_) => {}
            }
        }

        errors
    }
}

/// Map verification errors onto address fields.
fn verification_errors(field_errors: &[FieldError]) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for error in field_errors {
        let Some(field) = address_field(&error.field) else {
            debug!(field = %error.field, "ignoring verification error for unmapped field");
            continue;
        };

        let mut message = error.message.clone();
        if let Some(suggestion) = error.suggestion.as_deref().filter(|s| !s.is_empty()) {
            message.push_str(&format!(". Did you mean \"{}\"?", suggestion));
        }
        if field == "state" {
            message = message.replace("state", "province");
        }

        errors.add(field, message);
    }

    errors
}

fn address_field(carrier_field: &str) -> Option<&'static str> {
    match carrier_field {
        "street1" => Some("line1"),
        "street2" => Some("line2"),
        "zip" => Some("postal_code"),
        "city" => Some("city"),
        "state" => Some("state"),
        "country" => Some("country"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalServiceError;
    use crate::service::{Verification, Verifications, VerifiedAddress};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeVerifier {
        errors: Vec<FieldError>,
        seen: Mutex<Vec<AddressVerificationRequest>>,
    }

    impl FakeVerifier {
        fn new(errors: Vec<FieldError>) -> Arc<Self> {
            Arc::new(Self {
                errors,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AddressVerifier for FakeVerifier {
        async fn verify(&self, request: AddressVerificationRequest) -> Result<VerifiedAddress, ExternalServiceError> {
            self.seen.lock().unwrap().push(request);
            Ok(VerifiedAddress {
                id: Some("adr_1".to_string()),
                verifications: Verifications {
                    delivery: Some(Verification {
                        success: self.errors.is_empty(),
                        errors: self.errors.clone(),
                    }),
                },
            })
        }
    }

    struct FailingVerifier;

    #[async_trait]
    impl AddressVerifier for FailingVerifier {
        async fn verify(&self, _request: AddressVerificationRequest) -> Result<VerifiedAddress, ExternalServiceError> {
            Err(ExternalServiceError::Http {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    fn field_error(field: &str, message: &str, suggestion: Option<&str>) -> FieldError {
        FieldError {
            field: field.to_string(),
            message: message.to_string(),
            suggestion: suggestion.map(str::to_string),
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress::new("Jane Smith", "456 Oak Ave", "Los Angeles", "CA", "90001", "US")
    }

    #[tokio::test]
    async fn test_valid_address_passes() {
        let verifier = FakeVerifier::new(Vec::new());
        let validator = AddressValidator::new(verifier.clone(), Timeouts::default(), ServiceMode::Production);
        validator.validate(&address()).await.unwrap();

        let seen = verifier.seen.lock().unwrap();
        assert!(seen[0].verify);
        assert!(seen[0].residential);
        assert_eq!(seen[0].mode, "production");
        assert_eq!(seen[0].address.street1.as_deref(), Some("456 Oak Ave"));
        assert_eq!(seen[0].address.zip.as_deref(), Some("90001"));
    }

    #[tokio::test]
    async fn test_verification_errors_are_mapped() {
        let verifier = FakeVerifier::new(vec![
            field_error("street1", "Address not found", Some("456 OAK AVENUE")),
            field_error("zip", "Invalid zip", None),
            field_error("state", "Invalid state", None),
            field_error("residential", "Unknown", None),
        ]);
        let validator = AddressValidator::new(verifier, Timeouts::default(), ServiceMode::Test);

        let err = validator.validate(&address()).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(
            errors.first("line1"),
            Some("Address not found. Did you mean \"456 OAK AVENUE\"?")
        );
        assert_eq!(errors.first("postal_code"), Some("Invalid zip"));
        assert_eq!(errors.first("state"), Some("Invalid province"));
        assert!(!errors.has("residential"));
    }

    #[tokio::test]
    async fn test_field_rules_collect_everything() {
        let blank = ShippingAddress::default();
        let err = AddressValidator::offline().validate(&blank).await.unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["city", "country", "line1", "name", "postal_code", "state"]
        );
        assert_eq!(errors.first("line1"), Some("The address line 1 field is required."));
    }

    #[tokio::test]
    async fn test_dispatch_requires_phone() {
        let validator = AddressValidator::offline().for_dispatch();
        let err = validator.validate(&address()).await.unwrap_err();
        assert_eq!(
            err.validation_errors().unwrap().first("phone"),
            Some("The phone field is required.")
        );
        validator.validate(&address().with_phone("555-0100")).await.unwrap();
    }

    #[tokio::test]
    async fn test_service_failure_is_external_error() {
        let validator = AddressValidator::new(Arc::new(FailingVerifier), Timeouts::default(), ServiceMode::Test);
        let err = validator.validate(&address()).await.unwrap_err();
        assert!(matches!(
            err,
            ShippingError::ExternalService {
                service: ExternalService::AddressVerification,
                ..
            }
        ));
        assert!(err.is_retryable());
    }
}

//! Postal addresses and their carrier wire form.

use serde::{Deserialize, Serialize};

/// A postal address, used as a dispatch address and as a delivery address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    /// Addressee.
    pub name: String,
    /// Contact phone; carriers require one on the sending side.
    pub phone: Option<String>,
    /// Address line 1.
    pub line1: String,
    /// Address line 2 (apt, suite, etc.).
    pub line2: Option<String>,
    pub city: String,
    /// State or province code.
    pub state: String,
    pub postal_code: String,
    /// ISO country code (e.g., "US").
    pub country: String,
}

impl ShippingAddress {
    /// Create a new address.
    pub fn new(
        name: impl Into<String>,
        line1: impl Into<String>,
        city: impl Into<String>,
        state: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: None,
            line1: line1.into(),
            line2: None,
            city: city.into(),
            state: state.into(),
            postal_code: postal_code.into(),
            country: country.into(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_line2(mut self, line2: impl Into<String>) -> Self {
        self.line2 = Some(line2.into());
        self
    }

    /// Format as single line.
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.clone()];
        if let Some(ref line2) = self.line2 {
            parts.push(line2.clone());
        }
        parts.push(self.city.clone());
        parts.push(self.state.clone());
        parts.push(self.postal_code.clone());
        parts.push(self.country.clone());
        parts.join(", ")
    }
}

/// The address field set the shipment service understands.
///
/// Every field is optional: a quote request may carry nothing but a zip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CarrierAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl CarrierAddress {
    /// An address known only by its postal code.
    pub fn postal_code_only(zip: impl Into<String>) -> Self {
        Self {
            zip: Some(zip.into()),
            ..Self::default()
        }
    }

    /// Project the physical fields (street1, street2, city, state, zip,
    /// country, phone) of a stored address.
    pub fn from_address(address: &ShippingAddress) -> Self {
        Self {
            name: None,
            email: None,
            street1: Some(address.line1.clone()),
            street2: address.line2.clone(),
            city: Some(address.city.clone()),
            state: Some(address.state.clone()),
            zip: Some(address.postal_code.clone()),
            country: Some(address.country.clone()),
            phone: address.phone.clone(),
        }
    }

    /// As a recipient: the physical fields plus the addressee name.
    pub fn recipient(address: &ShippingAddress) -> Self {
        Self {
            name: Some(address.name.clone()),
            ..Self::from_address(address)
        }
    }
}

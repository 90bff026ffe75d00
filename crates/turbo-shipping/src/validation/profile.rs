//! Shipping profile validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::address::ShippingAddress;
use crate::config::ShippingConfig;
use crate::error::ShippingError;
use crate::profile::{DispatchPeriod, ShippingProfile};
use crate::validation::parcel::structural_errors;
use crate::validation::{NumericInput, ParcelInput, ValidationErrors};

/// Profile fields as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub parcel: ParcelInput,
    /// Index into the dispatch tiers; None is ready to ship.
    #[serde(default)]
    pub dispatch_period: Option<i64>,
    /// Minor currency units.
    #[serde(default)]
    pub handling_fee: Option<i64>,
    #[serde(default)]
    pub free_shipping_domestic: bool,
    #[serde(default)]
    pub free_shipping_international: bool,
    #[serde(default)]
    pub delivers_to: Option<Vec<String>>,
    #[serde(default)]
    pub custom_rates: bool,
    /// Validated separately with the dispatch address rules.
    #[serde(default)]
    pub dispatch_address: Option<ShippingAddress>,
}

impl ProfileInput {
    pub fn new(parcel: ParcelInput) -> Self {
        Self {
            parcel,
            ..Self::default()
        }
    }

    /// Write the submitted fields onto `profile`. Call after validation.
    pub fn apply_to(&self, profile: &mut ShippingProfile) -> Result<(), ShippingError> {
        let number = |value: &Option<NumericInput>| -> Result<Option<f64>, ShippingError> {
            match value.as_ref().filter(|v| !v.is_blank()) {
                None => Ok(None),
                Some(v) => v
                    .as_number()
                    .map(Some)
                    .ok_or_else(|| ShippingError::InvalidValue(format!("{:?}", v))),
            }
        };

        if self.name.is_some() {
            profile.name = self.name.clone();
        }
        profile.weight = number(&self.parcel.weight)?;
        if let Some(unit) = &self.parcel.weight_unit {
            profile.weight_unit = unit.clone();
        }
        profile.length = number(&self.parcel.length)?;
        profile.width = number(&self.parcel.width)?;
        profile.height = number(&self.parcel.height)?;
        if let Some(unit) = &self.parcel.length_unit {
            profile.length_unit = unit.clone();
        }
        profile.dispatch_period = match self.dispatch_period {
            None => None,
            Some(index) => Some(
                usize::try_from(index)
                    .ok()
                    .and_then(DispatchPeriod::from_index)
                    .ok_or_else(|| ShippingError::InvalidValue(index.to_string()))?,
            ),
        };
        profile.handling_fee = self.handling_fee;
        profile.free_shipping_domestic = self.free_shipping_domestic;
        profile.free_shipping_international = self.free_shipping_international;
        profile.delivers_to = self.delivers_to.clone();
        profile.custom_rates = self.custom_rates;
        if self.dispatch_address.is_some() {
            profile.dispatch_address = self.dispatch_address.clone();
        }
        Ok(())
    }
}

/// Profile rules, with units and countries taken from configuration.
#[derive(Debug, Clone)]
pub struct ProfileValidator {
    weight_units: BTreeSet<String>,
    length_units: BTreeSet<String>,
    countries: BTreeSet<String>,
}

impl ProfileValidator {
    pub fn from_config(config: &ShippingConfig) -> Self {
        Self {
            weight_units: config.weight_units.iter().cloned().collect(),
            length_units: config.length_units.iter().cloned().collect(),
            countries: config.supported_countries.keys().cloned().collect(),
        }
    }

    pub fn validate(&self, input: &ProfileInput) -> Result<(), ValidationErrors> {
        let mut errors = structural_errors(&input.parcel);

        let units = [
            ("weight_unit", &input.parcel.weight_unit, &self.weight_units, "weight unit"),
            ("length_unit", &input.parcel.length_unit, &self.length_units, "length unit"),
        ];
        for (field, value, allowed, label) in units {
            if errors.has(field) {
                continue;
            }
            if let Some(unit) = value.as_deref().filter(|u| !u.trim().is_empty()) {
                if !allowed.contains(unit) {
                    errors.add(field, format!("The selected {} is invalid.", label));
                }
            }
        }

        if let Some(index) = input.dispatch_period {
            let valid = usize::try_from(index).ok().and_then(DispatchPeriod::from_index).is_some();
            if !valid {
                errors.add("dispatch_period", "The selected dispatch period is invalid.");
            }
        }

        if input.handling_fee.is_some_and(|fee| fee < 0) {
            errors.add("handling_fee", "The handling fee field must be at least 0.");
        }

        for (i, code) in input.delivers_to.iter().flatten().enumerate() {
            if !self.countries.contains(code.as_str()) {
                let field = format!("delivers_to.{}", i);
                let message = format!("The selected {} is invalid.", field);
                errors.add(field, message);
            }
        }

        errors.into_result()
    }
}

impl Default for ProfileValidator {
    fn default() -> Self {
        Self::from_config(&ShippingConfig::default())
    }
}

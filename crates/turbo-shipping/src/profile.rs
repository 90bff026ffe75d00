//! Shipping profiles, options and rates.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::{CarrierAddress, ShippingAddress};
use crate::carrier::CarrierRegistry;
use crate::error::ShippingError;
use crate::ids::{ShippingOptionId, ShippingOptionRateId, ShippingProfileId, ShopId};
use crate::money::Currency;
use crate::service::Parcel;
use crate::units::{Length, Weight};

/// Handling-time tiers, in days.
pub const DISPATCH_OPTIONS: [&str; 4] = ["1-3", "4-6", "7-10", "11+"];

/// How long a merchant takes to hand a package to the carrier.
///
/// An index into [`DISPATCH_OPTIONS`]. "Ready to ship" is the absence of a
/// period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct DispatchPeriod(usize);

impl DispatchPeriod {
    pub const ONE_TO_THREE: DispatchPeriod = DispatchPeriod(0);
    pub const FOUR_TO_SIX: DispatchPeriod = DispatchPeriod(1);
    pub const SEVEN_TO_TEN: DispatchPeriod = DispatchPeriod(2);
    pub const ELEVEN_PLUS: DispatchPeriod = DispatchPeriod(3);

    pub fn from_index(index: usize) -> Option<Self> {
        (index < DISPATCH_OPTIONS.len()).then_some(Self(index))
    }

    pub fn index(&self) -> usize {
        self.0
    }

    /// The tier's day range, e.g. "4-6".
    pub fn label(&self) -> &'static str {
        DISPATCH_OPTIONS[self.0]
    }

    pub fn is_open_ended(&self) -> bool {
        self.0 == DISPATCH_OPTIONS.len() - 1
    }

    /// `(min, max)` days for bounded tiers.
    pub fn day_range(&self) -> Option<(u32, u32)> {
        let (min, max) = self.label().split_once('-')?;
        Some((min.trim().parse().ok()?, max.trim().parse().ok()?))
    }

    /// Lower bound of the open-ended tier ("11+" → 11).
    pub fn open_ended_days(&self) -> Option<u32> {
        self.label().strip_suffix('+')?.parse().ok()
    }
}

impl TryFrom<usize> for DispatchPeriod {
    type Error = String;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::from_index(index).ok_or_else(|| format!("dispatch period {index} out of range"))
    }
}

impl From<DispatchPeriod> for usize {
    fn from(period: DispatchPeriod) -> usize {
        period.0
    }
}

impl fmt::Display for DispatchPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} days", self.label())
    }
}

/// A merchant's shop, as far as shipping is concerned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shop {
    pub id: ShopId,
    /// Display name, used as the sender name.
    pub name: String,
    /// Contact email of the shop owner.
    pub owner_email: String,
    pub currency: Currency,
    /// Default dispatch address.
    pub dispatch_address: Option<ShippingAddress>,
}

/// A reusable or one-off shipping specification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingProfile {
    pub id: ShippingProfileId,
    pub shop_id: ShopId,
    /// None for anonymous ("custom") profiles.
    pub name: Option<String>,
    pub weight: Option<f64>,
    pub weight_unit: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub length: Option<f64>,
    pub length_unit: String,
    /// None means everywhere.
    pub delivers_to: Option<Vec<String>>,
    /// None means ready to ship.
    pub dispatch_period: Option<DispatchPeriod>,
    pub free_shipping_domestic: bool,
    pub free_shipping_international: bool,
    /// Minor currency units.
    pub handling_fee: Option<i64>,
    /// Merchant-entered rates instead of carrier quotes.
    pub custom_rates: bool,
    /// Catalog-level profile rather than one bound to a single item.
    pub is_shared: bool,
    /// Overrides the shop's default dispatch address.
    pub dispatch_address: Option<ShippingAddress>,
}

impl ShippingProfile {
    fn blank(shop_id: ShopId, name: Option<String>, is_shared: bool) -> Self {
        Self {
            id: ShippingProfileId::generate(),
            shop_id,
            name,
            weight: None,
            weight_unit: "lb".to_string(),
            width: None,
            height: None,
            length: None,
            length_unit: "in".to_string(),
            delivers_to: None,
            dispatch_period: None,
            free_shipping_domestic: false,
            free_shipping_international: false,
            handling_fee: None,
            custom_rates: false,
            is_shared,
            dispatch_address: None,
        }
    }

    /// A named catalog-level profile.
    pub fn new_shared(shop_id: ShopId, name: impl Into<String>) -> Self {
        Self::blank(shop_id, Some(name.into()), true)
    }

    /// An anonymous profile for a single shippable item.
    pub fn one_off(shop_id: ShopId) -> Self {
        Self::blank(shop_id, None, false)
    }

    pub fn with_weight(mut self, weight: f64, unit: impl Into<String>) -> Self {
        self.weight = Some(weight);
        self.weight_unit = unit.into();
        self
    }

    pub fn with_dimensions(mut self, length: f64, width: f64, height: f64, unit: impl Into<String>) -> Self {
        self.length = Some(length);
        self.width = Some(width);
        self.height = Some(height);
        self.length_unit = unit.into();
        self
    }

    pub fn with_dispatch_address(mut self, address: ShippingAddress) -> Self {
        self.dispatch_address = Some(address);
        self
    }

    pub fn has_dimensions(&self) -> bool {
        self.length.is_some() && self.width.is_some() && self.height.is_some()
    }

    /// "Ready to ship", or the made-to-order dispatch window.
    pub fn dispatch_period_name(&self) -> String {
        match self.dispatch_period {
            None => "Ready to ship".to_string(),
            Some(period) => format!("Made to Order: Dispatches in {} days", period.label()),
        }
    }

    /// The address packages leave from.
    pub fn effective_dispatch_address<'a>(&'a self, shop: &'a Shop) -> Option<&'a ShippingAddress> {
        self.dispatch_address
            .as_ref()
            .or(shop.dispatch_address.as_ref())
    }

    /// Country packages leave from.
    pub fn origin_country<'a>(&'a self, shop: &'a Shop) -> Option<&'a str> {
        self.effective_dispatch_address(shop)
            .map(|a| a.country.as_str())
    }

    /// Sender address for the shipment service.
    ///
    /// The profile's own dispatch address when set, else the shop's, with the
    /// shop name and owner email as contact.
    pub fn dispatch_payload(&self, shop: &Shop) -> Result<CarrierAddress, ShippingError> {
        let address = self
            .effective_dispatch_address(shop)
            .ok_or_else(|| ShippingError::MissingDispatchAddress(self.id.to_string()))?;

        Ok(CarrierAddress {
            name: Some(shop.name.clone()),
            email: Some(shop.owner_email.clone()),
            ..CarrierAddress::from_address(address)
        })
    }

    /// Parcel for the shipment service: weight in ounces, dimensions in
    /// inches when present.
    pub fn parcel_payload(&self) -> Result<Parcel, ShippingError> {
        let weight = self
            .weight
            .ok_or_else(|| ShippingError::MissingParcel(self.id.to_string()))?;

        let mut parcel = Parcel {
            weight: Weight::to_oz(weight, &self.weight_unit)?,
            ..Parcel::default()
        };

        if let (Some(length), Some(width), Some(height)) = (self.length, self.width, self.height) {
            parcel.length = Some(Length::to_in(length, &self.length_unit)?);
            parcel.width = Some(Length::to_in(width, &self.length_unit)?);
            parcel.height = Some(Length::to_in(height, &self.length_unit)?);
        }

        Ok(parcel)
    }
}

/// A carrier service (automatic) or a merchant-defined option (custom).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingOption {
    pub id: ShippingOptionId,
    /// Carrier service identifier, or the merchant's label.
    pub name: String,
    /// None for custom, fixed-rate options.
    pub carrier: Option<String>,
    /// Owning shop, for custom options.
    pub shop_id: Option<ShopId>,
}

impl ShippingOption {
    /// A carrier-backed option.
    pub fn automatic(name: impl Into<String>, carrier: impl Into<String>) -> Self {
        Self {
            id: ShippingOptionId::generate(),
            name: name.into(),
            carrier: Some(carrier.into()),
            shop_id: None,
        }
    }

    /// A merchant-defined option.
    pub fn custom(name: impl Into<String>, shop_id: ShopId) -> Self {
        Self {
            id: ShippingOptionId::generate(),
            name: name.into(),
            carrier: None,
            shop_id: Some(shop_id),
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.carrier.is_some()
    }

    /// Carrier account id from the registry.
    pub fn carrier_account_id<'a>(&self, registry: &'a CarrierRegistry) -> Option<&'a str> {
        self.carrier
            .as_deref()
            .and_then(|carrier| registry.account_id(carrier))
    }

    /// Name for display ("FEDEX_GROUND" → "FEDEX GROUND").
    pub fn name_formatted(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// One computed or merchant-entered price for an option.
///
/// Rates are never deleted; the option's current rate is the newest one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingOptionRate {
    pub id: ShippingOptionRateId,
    pub shipping_option_id: ShippingOptionId,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub delivery_days: Option<u32>,
    /// Quote request this rate came from; None for merchant-entered rates.
    pub carrier_shipment_id: Option<String>,
    pub carrier_rate_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Store-assigned insertion order, breaking `created_at` ties.
    pub revision: u64,
}

impl ShippingOptionRate {
    /// Sort key selecting the current rate.
    pub fn recency(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.revision)
    }
}

/// Rate fields written by an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct RateValues {
    pub amount: i64,
    pub currency: String,
    pub delivery_days: Option<u32>,
    pub carrier_rate_id: Option<String>,
}

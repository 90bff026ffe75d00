//! Money type for representing monetary values.
//!
//! Amounts are integer minor units. Carrier prices arrive as decimal strings
//! in major units and are converted exactly with `rust_decimal`.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::ShippingError;

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    USD,
    CAD,
    EUR,
    GBP,
    JPY,
    AUD,
}

impl Currency {
    /// Get the currency code (e.g., "USD").
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::CAD => "CAD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::AUD => "AUD",
        }
    }

    /// Get the currency symbol (e.g., "$").
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::CAD => "CA$",
            Currency::EUR => "\u{20ac}",
            Currency::GBP => "\u{00a3}",
            Currency::JPY => "\u{00a5}",
            Currency::AUD => "A$",
        }
    }

    /// Number of decimal places in the minor unit.
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Parse a currency code, case-insensitively ("usd" and "USD" both work).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "USD" => Some(Currency::USD),
            "CAD" => Some(Currency::CAD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "JPY" => Some(Currency::JPY),
            "AUD" => Some(Currency::AUD),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A monetary value with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Money {
    /// Amount in the smallest currency unit (e.g., cents).
    pub amount: i64,
    /// The currency.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money value from minor units.
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Convert a decimal major-unit string ("10.50") to minor units.
    ///
    /// Rounds half away from zero at the currency's precision.
    ///
    /// ```
    /// use turbo_shipping::money::{Currency, Money};
    /// let price = Money::parse_decimal("10.50", Currency::USD).unwrap();
    /// assert_eq!(price.amount, 1050);
    /// ```
    pub fn parse_decimal(amount: &str, currency: Currency) -> Result<Self, ShippingError> {
        Ok(Self::new(to_minor_units(amount, currency.decimal_places())?, currency))
    }

    /// Convert to a decimal value.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.amount, self.currency.decimal_places())
    }

    /// Format as a display string (e.g., "$49.99").
    pub fn display(&self) -> String {
        format!("{}{}", self.currency.symbol(), self.display_amount())
    }

    /// Format without symbol (e.g., "49.99").
    pub fn display_amount(&self) -> String {
        let places = self.currency.decimal_places() as usize;
        format!("{:.places$}", self.to_decimal())
    }

    /// Try to add another Money value, returning None if currencies don't match.
    pub fn try_add(&self, other: &Money) -> Option<Money> {
        if self.currency != other.currency {
            return None;
        }
        Some(Money::new(self.amount.checked_add(other.amount)?, self.currency))
    }
}

impl Add for Money {
    type Output = Option<Money>;

    fn add(self, other: Money) -> Option<Money> {
        self.try_add(&other)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Convert a decimal string to integer minor units at `places` precision.
///
/// Currency codes reported by carriers are not always ones we model, so this
/// works from the precision alone.
pub fn to_minor_units(amount: &str, places: u32) -> Result<i64, ShippingError> {
    let decimal = Decimal::from_str(amount.trim())
        .map_err(|_| ShippingError::InvalidValue(amount.to_string()))?;
    let scale = Decimal::from(10_i64.pow(places));
    (decimal * scale)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| ShippingError::InvalidValue(amount.to_string()))
}

/// Minor-unit precision for a carrier-reported currency code.
pub fn decimal_places_for(code: &str) -> u32 {
    Currency::from_code(code)
        .map(|c| c.decimal_places())
        .unwrap_or(2)
}

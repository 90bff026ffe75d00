//! Delivery and dispatch date estimates.
//!
//! An estimate starts from today, adds the carrier's transit days when they
//! are known, then the merchant's handling time: nothing for ready-to-ship
//! profiles, an open-ended lower bound for the last tier, and a date range
//! for the bounded tiers.

use std::fmt;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::carrier::CarrierRegistry;
use crate::money::Money;
use crate::profile::DispatchPeriod;

/// Whether the estimate covers transit or only handling time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateKind {
    /// Transit days known: the package arrives in the window.
    Arrives,
    /// Transit unknown: the package leaves the merchant in the window.
    Dispatches,
}

impl EstimateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateKind::Arrives => "Arrives",
            EstimateKind::Dispatches => "Dispatches",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimateWindow {
    On(NaiveDate),
    After(NaiveDate),
    Between(NaiveDate, NaiveDate),
}

impl fmt::Display for EstimateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateWindow::On(date) => write!(f, "{}", format_date(*date)),
            EstimateWindow::After(date) => write!(f, "after {}", format_date(*date)),
            EstimateWindow::Between(min, max) => {
                write!(f, "between {} and {}", format_date(*min), format_date(*max))
            }
        }
    }
}

/// A delivery or dispatch estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEstimate {
    pub kind: EstimateKind,
    pub window: EstimateWindow,
}

impl fmt::Display for DeliveryEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.window)
    }
}

/// Estimate when a package arrives, or when it leaves the merchant when
/// transit time is unknown.
///
/// ```
/// use chrono::NaiveDate;
/// use turbo_shipping::estimate::estimate;
///
/// let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// assert_eq!(estimate(None, Some(3), today).to_string(), "Arrives Thursday, January 4th");
/// ```
pub fn estimate(dispatch_period: Option<DispatchPeriod>, delivery_days: Option<u32>, today: NaiveDate) -> DeliveryEstimate {
    let base = match delivery_days {
        Some(days) => add_days(today, days),
        None => today,
    };

    let window = match dispatch_period {
        None => EstimateWindow::On(base),
        Some(period) => match (period.day_range(), period.open_ended_days()) {
            (Some((min, max)), _) => EstimateWindow::Between(add_days(base, min), add_days(base, max)),
            (None, Some(days)) => EstimateWindow::After(add_days(base, days)),
            (None, None) => EstimateWindow::On(base),
        },
    };

    let kind = if delivery_days.is_some() {
        EstimateKind::Arrives
    } else {
        EstimateKind::Dispatches
    };

    DeliveryEstimate { kind, window }
}

/// Checkout label for an option: carrier, service, price and estimate.
///
/// `"UPS Ground $10.50 - Arrives Thursday, January 4th"`
pub fn option_label(
    registry: &CarrierRegistry,
    carrier: &str,
    service: &str,
    price: Money,
    estimate: &DeliveryEstimate,
) -> String {
    format!(
        "{} {} {} - {}",
        registry.display_name(carrier),
        service,
        price.display(),
        estimate
    )
}

/// "Monday, January 1st".
pub fn format_date(date: NaiveDate) -> String {
    format!("{}{}", date.format("%A, %B %-d"), ordinal_suffix(date.day()))
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_ready_to_ship_with_transit() {
        let est = estimate(None, Some(3), jan(1));
        assert_eq!(est.kind, EstimateKind::Arrives);
        assert_eq!(est.window, EstimateWindow::On(jan(4)));
        assert_eq!(est.to_string(), "Arrives Thursday, January 4th");
    }

    #[test]
    fn test_open_ended_tier() {
        let est = estimate(Some(DispatchPeriod::ELEVEN_PLUS), None, jan(1));
        assert_eq!(est.window, EstimateWindow::After(jan(12)));
        assert_eq!(est.to_string(), "Dispatches after Friday, January 12th");
    }

    #[test]
    fn test_bounded_tier_is_a_range() {
        let est = estimate(Some(DispatchPeriod::ONE_TO_THREE), None, jan(1));
        assert_eq!(est.window, EstimateWindow::Between(jan(2), jan(4)));
        assert_eq!(
            est.to_string(),
            "Dispatches between Tuesday, January 2nd and Thursday, January 4th"
        );
    }

    #[test]
    fn test_transit_and_handling_combine() {
        let est = estimate(Some(DispatchPeriod::FOUR_TO_SIX), Some(2), jan(1));
        assert_eq!(est.kind, EstimateKind::Arrives);
        assert_eq!(est.window, EstimateWindow::Between(jan(7), jan(9)));
    }

    #[test]
    fn test_ready_to_ship_without_transit_is_today() {
        let est = estimate(None, None, jan(1));
        assert_eq!(est.to_string(), "Dispatches Monday, January 1st");
    }

    #[test]
    fn test_ordinals() {
        let suffixes: Vec<_> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 23, 31].iter().map(|d| ordinal_suffix(*d)).collect();
        assert_eq!(
            suffixes,
            vec!["st", "nd", "rd", "th", "th", "th", "th", "st", "nd", "rd", "st"]
        );
    }

    #[test]
    fn test_option_label() {
        let est = estimate(None, Some(3), jan(1));
        let label = option_label(
            CarrierRegistry::builtin(),
            "UPS",
            "Ground",
            Money::new(1050, Currency::USD),
            &est,
        );
        assert_eq!(label, "UPS Ground $10.50 - Arrives Thursday, January 4th");
    }
}

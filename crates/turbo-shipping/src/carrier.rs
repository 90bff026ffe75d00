//! Static carrier registry.
//!
//! Maps a carrier key ("UPS", "CanadaPost", ...) to the account id the
//! shipment service knows it by, plus display metadata and service names.
//! The registry is built once and never mutated; share it behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// One carrier account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carrier {
    /// Carrier account id at the shipment service.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Icon path.
    #[serde(default)]
    pub icon: Option<String>,
    /// Countries this carrier ships from.
    #[serde(default)]
    pub supported_origins: Vec<String>,
    /// Countries this carrier ships to; empty means everywhere.
    #[serde(default)]
    pub supported_destinations: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Service identifiers, as used for option names.
    #[serde(default)]
    pub services: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl Carrier {
    pub fn ships_from(&self, country: &str) -> bool {
        self.supported_origins
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }

    pub fn ships_to(&self, country: &str) -> bool {
        self.supported_destinations.is_empty()
            || self
                .supported_destinations
                .iter()
                .any(|c| c.eq_ignore_ascii_case(country))
    }

    pub fn offers(&self, service: &str) -> bool {
        self.services.iter().any(|s| s == service)
    }
}

/// Immutable table of carriers keyed by carrier key.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CarrierRegistry {
    carriers: BTreeMap<String, Carrier>,
}

impl CarrierRegistry {
    pub fn new(carriers: BTreeMap<String, Carrier>) -> Self {
        Self { carriers }
    }

    /// The built-in carriers, constructed on first use.
    pub fn builtin() -> &'static CarrierRegistry {
        static BUILTIN: OnceLock<CarrierRegistry> = OnceLock::new();
        BUILTIN.get_or_init(builtin_carriers)
    }

    pub fn get(&self, key: &str) -> Option<&Carrier> {
        self.carriers.get(key)
    }

    /// Account id for an enabled carrier.
    pub fn account_id(&self, key: &str) -> Option<&str> {
        self.get(key)
            .filter(|c| c.enabled)
            .map(|c| c.id.as_str())
    }

    /// Display name, falling back to the key itself.
    pub fn display_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.get(key).map(|c| c.name.as_str()).unwrap_or(key)
    }

    /// Keys of enabled carriers that ship from `country`.
    pub fn carriers_for_origin(&self, country: &str) -> Vec<&str> {
        self.carriers
            .iter()
            .filter(|(_, c)| c.enabled && c.ships_from(country))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn supports_service(&self, key: &str, service: &str) -> bool {
        self.get(key).is_some_and(|c| c.offers(service))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Carrier)> {
        self.carriers.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.carriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }
}

fn carrier(id: &str, name: &str, icon: &str, origins: &[&str], services: &[&str]) -> Carrier {
    Carrier {
        id: id.to_string(),
        name: name.to_string(),
        icon: Some(icon.to_string()),
        supported_origins: origins.iter().map(|s| s.to_string()).collect(),
        supported_destinations: Vec::new(),
        enabled: true,
        services: services.iter().map(|s| s.to_string()).collect(),
    }
}

fn builtin_carriers() -> CarrierRegistry {
    let mut carriers = BTreeMap::new();

    carriers.insert(
        "CanadaPost".to_string(),
        carrier(
            "ca_8eef23208afa469a9f29f4c222ea791c",
            "Canada Post",
            "/images/shipping-carriers/canadapost.svg",
            &["CA"],
            &[
                "RegularParcel",
                "ExpeditedParcel",
                "Xpresspost",
                "Priority",
                "ExpeditedParcelUSA",
                "SmallPacketUSAAir",
                "TrackedPacketUSA",
                "TrackedPacketUSALVM",
                "XpresspostUSA",
                "XpresspostInternational",
                "InternationalParcelAir",
                "InternationalParcelSurface",
                "SmallPacketInternationalAir",
                "SmallPacketInternationalSurface",
                "TrackedPacketInternational",
                "ExpeditedParcelPlus",
            ],
        ),
    );
    carriers.insert(
        "FedEx".to_string(),
        carrier(
            "ca_6cd6e704f6104a048df8182b14680f1a",
            "FedEx",
            "/images/shipping-carriers/fedex.svg",
            &["CA", "US"],
            &[
                "FEDEX_2_DAY",
                "FEDEX_2_DAY_AM",
                "FEDEX_EXPRESS_SAVER",
                "FEDEX_GROUND",
                "FEDEX_INTERNATIONAL_CONNECT_PLUS",
                "FIRST_OVERNIGHT",
                "GROUND_HOME_DELIVERY",
                "INTERNATIONAL_ECONOMY",
                "INTERNATIONAL_FIRST",
                "INTERNATIONAL_PRIORITY",
                "PRIORITY_OVERNIGHT",
                "SMART_POST",
                "STANDARD_OVERNIGHT",
            ],
        ),
    );
    carriers.insert(
        "UPS".to_string(),
        carrier(
            "ca_feac6b4eec3c4f7dbd80cb8079e3b02d",
            "UPS",
            "/images/shipping-carriers/ups.svg",
            &["US"],
            &[
                "Ground",
                "UPSStandard",
                "UPSSaver",
                "Express",
                "ExpressPlus",
                "Expedited",
                "NextDayAir",
                "NextDayAirSaver",
                "NextDayAirEarlyAM",
                "2ndDayAir",
                "2ndDayAirAM",
                "3DaySelect",
            ],
        ),
    );
    carriers.insert(
        "USPS".to_string(),
        carrier(
            "ca_4fa26545dc084547b7bdbc32811914e8",
            "USPS",
            "/images/shipping-carriers/usps.svg",
            &["US"],
            &[
                "First",
                "Priority",
                "Express",
                "GroundAdvantage",
                "LibraryMail",
                "MediaMail",
                "FirstClassMailInternational",
                "FirstClassPackageInternationalService",
                "PriorityMailInternational",
                "ExpressMailInternational",
            ],
        ),
    );

    CarrierRegistry::new(carriers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_four_carriers() {
        let registry = CarrierRegistry::builtin();
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry.account_id("UPS"),
            Some("ca_feac6b4eec3c4f7dbd80cb8079e3b02d")
        );
        assert_eq!(registry.display_name("CanadaPost"), "Canada Post");
        assert_eq!(registry.display_name("DHL"), "DHL");
    }

    #[test]
    fn test_builtin_is_shared() {
        assert!(std::ptr::eq(CarrierRegistry::builtin(), CarrierRegistry::builtin()));
    }

    #[test]
    fn test_carriers_for_origin() {
        let registry = CarrierRegistry::builtin();
        assert_eq!(registry.carriers_for_origin("CA"), vec!["CanadaPost", "FedEx"]);
        assert_eq!(registry.carriers_for_origin("us"), vec!["FedEx", "UPS", "USPS"]);
    }

    #[test]
    fn test_disabled_carrier_has_no_account() {
        let mut ups = CarrierRegistry::builtin().get("UPS").cloned().unwrap();
        ups.enabled = false;
        let registry = CarrierRegistry::new(BTreeMap::from([("UPS".to_string(), ups)]));
        assert_eq!(registry.account_id("UPS"), None);
        assert!(registry.carriers_for_origin("US").is_empty());
    }

    #[test]
    fn test_services() {
        let registry = CarrierRegistry::builtin();
        assert!(registry.supports_service("USPS", "GroundAdvantage"));
        assert!(!registry.supports_service("USPS", "Ground"));
        assert!(registry.get("FedEx").unwrap().ships_to("JP"));
    }
}

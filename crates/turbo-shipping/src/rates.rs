//! Carrier rate calculation.
//!
//! One quote request per calculation: the profile's dispatch address and
//! parcel against the destination, restricted to the carrier accounts of the
//! profile's automatic options. Quotes are paired with options by the
//! case-insensitive `"<service>-<carrier>"` key and stored as rates keyed by
//! the quote's shipment id, so recalculating against the same shipment
//! updates rather than duplicates.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::address::CarrierAddress;
use crate::carrier::CarrierRegistry;
use crate::config::Timeouts;
use crate::error::{ExternalService, ShippingError};
use crate::money::{decimal_places_for, to_minor_units, Currency};
use crate::profile::{RateValues, ShippingOption, ShippingOptionRate, ShippingProfile, Shop};
use crate::service::{match_key, CarrierRate, ShipmentRequest, ShipmentService};
use crate::store::ShippingStore;

/// A configured option paired with the quote it matched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRate {
    pub option: ShippingOption,
    pub quote: CarrierRate,
    /// The stored rate row.
    pub rate: ShippingOptionRate,
}

/// Outcome of one calculation.
#[derive(Debug, Clone, Default)]
pub struct RateCalculation {
    /// Shipment id of the quote request; None when no request was made.
    pub shipment_id: Option<String>,
    pub matched: Vec<MatchedRate>,
    /// Options the carriers returned no quote for. Expected, not a failure.
    pub unavailable: Vec<ShippingError>,
}

impl RateCalculation {
    /// The matched carrier quotes.
    pub fn quotes(&self) -> impl Iterator<Item = &CarrierRate> {
        self.matched.iter().map(|m| &m.quote)
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Quotes a profile's automatic options and stores the results.
#[derive(Clone)]
pub struct RateCalculator {
    service: Arc<dyn ShipmentService>,
    store: Arc<dyn ShippingStore>,
    registry: Arc<CarrierRegistry>,
    timeouts: Timeouts,
}

impl RateCalculator {
    pub fn new(
        service: Arc<dyn ShipmentService>,
        store: Arc<dyn ShippingStore>,
        registry: Arc<CarrierRegistry>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            service,
            store,
            registry,
            timeouts,
        }
    }

    /// Request quotes for `profile` shipping to `destination` and store a
    /// rate for every automatic option a quote matched.
    ///
    /// Profiles with merchant-entered rates are never quoted and yield an
    /// empty calculation.
    #[instrument(skip_all, fields(profile = %profile.id, currency = %currency))]
    pub async fn calculate(
        &self,
        profile: &ShippingProfile,
        shop: &Shop,
        destination: &CarrierAddress,
        currency: Currency,
    ) -> Result<RateCalculation, ShippingError> {
        if profile.custom_rates {
            debug!("profile uses custom rates; skipping carrier quote");
            return Ok(RateCalculation::default());
        }

        let options: Vec<ShippingOption> = self
            .store
            .profile_options(&profile.id)
            .await?
            .into_iter()
            .filter(ShippingOption::is_automatic)
            .collect();

        let from_address = profile.dispatch_payload(shop)?;
        let parcel = profile.parcel_payload()?;

        let accounts = self.carrier_accounts(&options);
        if accounts.is_empty() {
            debug!(options = options.len(), "no carrier accounts to quote; skipping carrier quote");
            return Ok(RateCalculation {
                unavailable: options.into_iter().map(unavailable).collect(),
                ..RateCalculation::default()
            });
        }

        let request = ShipmentRequest::new(from_address, destination.clone(), parcel)
            .with_carrier_accounts(accounts)
            .with_currency(currency.code());

        let shipment = self
            .timeouts
            .run(ExternalService::Shipment, self.service.create_shipment(request))
            .await
            .map_err(|e| ShippingError::external(ExternalService::Shipment, e))?;

        let quotes: HashMap<String, &CarrierRate> =
            shipment.rates.iter().map(|rate| (rate.match_key(), rate)).collect();

        let mut calculation = RateCalculation {
            shipment_id: Some(shipment.id.clone()),
            ..RateCalculation::default()
        };

        for option in options {
            let carrier = option.carrier.as_deref().unwrap_or_default();
            let Some(quote) = quotes.get(&match_key(&option.name, carrier)) else {
                debug!(option = %option.name, %carrier, "no quote for option");
                calculation.unavailable.push(unavailable(option));
                continue;
            };

            let values = RateValues {
                amount: to_minor_units(&quote.rate, decimal_places_for(&quote.currency))?,
                currency: quote.currency.clone(),
                delivery_days: quote.delivery_days,
                carrier_rate_id: Some(quote.id.clone()),
            };
            let rate = self.store.upsert_rate(&option.id, Some(&shipment.id), values).await?;

            calculation.matched.push(MatchedRate {
                option,
                quote: (*quote).clone(),
                rate,
            });
        }

        info!(
            shipment = %shipment.id,
            matched = calculation.matched.len(),
            unavailable = calculation.unavailable.len(),
            "calculated shipping rates"
        );

        Ok(calculation)
    }

    /// Distinct account ids of the given options' carriers.
    fn carrier_accounts(&self, options: &[ShippingOption]) -> Vec<String> {
        let mut accounts = BTreeSet::new();
        for option in options {
            match option.carrier_account_id(&self.registry) {
                Some(id) => {
                    accounts.insert(id.to_string());
                }
                None => warn!(
                    option = %option.name,
                    carrier = option.carrier.as_deref().unwrap_or_default(),
                    "carrier not in registry; option will not be quoted"
                ),
            }
        }
        accounts.into_iter().collect()
    }
}

fn unavailable(option: ShippingOption) -> ShippingError {
    ShippingError::CarrierQuoteUnavailable {
        carrier: option.carrier.unwrap_or_default(),
        option: option.name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ShippingAddress;
    use crate::error::ExternalServiceError;
    use crate::ids::ShopId;
    use crate::service::Shipment;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct QuoteService {
        rates: Vec<CarrierRate>,
        requests: Mutex<Vec<ShipmentRequest>>,
    }

    #[async_trait]
    impl ShipmentService for QuoteService {
        async fn create_shipment(&self, request: ShipmentRequest) -> Result<Shipment, ExternalServiceError> {
            self.requests.lock().unwrap().push(request);
            Ok(Shipment {
                id: "shp_1".to_string(),
                rates: self.rates.clone(),
                selected_rate: None,
                postage_label: None,
                tracker: None,
                messages: Vec::new(),
            })
        }
    }

    fn quote(carrier: &str, service: &str, rate: &str) -> CarrierRate {
        CarrierRate {
            id: format!("rate_{}", service.to_lowercase()),
            carrier: carrier.to_string(),
            service: service.to_string(),
            rate: rate.to_string(),
            currency: "usd".to_string(),
            delivery_days: Some(5),
        }
    }

    fn shop() -> Shop {
        Shop {
            id: ShopId::new("shop_1"),
            name: "Acme".to_string(),
            owner_email: "owner@acme.test".to_string(),
            currency: Currency::USD,
            dispatch_address: Some(
                ShippingAddress::new("Acme", "1 Main St", "Springfield", "IL", "62701", "US").with_phone("555-0100"),
            ),
        }
    }

    async fn setup(
        rates: Vec<CarrierRate>,
        options: Vec<ShippingOption>,
    ) -> (RateCalculator, Arc<QuoteService>, Arc<InMemoryStore>, ShippingProfile) {
        let service = Arc::new(QuoteService {
            rates,
            requests: Mutex::new(Vec::new()),
        });
        let store = Arc::new(InMemoryStore::new());
        let profile = ShippingProfile::new_shared(ShopId::new("shop_1"), "Mugs").with_weight(1.0, "lb");
        let ids: Vec<_> = options.iter().map(|o| o.id.clone()).collect();
        for option in options {
            store.save_option(option).await.unwrap();
        }
        store.attach_options(&profile.id, &ids).await.unwrap();

        let calculator = RateCalculator::new(
            service.clone(),
            store.clone(),
            Arc::new(CarrierRegistry::builtin().clone()),
            Timeouts::default(),
        );
        (calculator, service, store, profile)
    }

    #[tokio::test]
    async fn test_matches_case_insensitively() {
        let ground = ShippingOption::automatic("GROUND", "UPS");
        let (calculator, _, store, profile) = setup(vec![quote("ups", "Ground", "10.50")], vec![ground.clone()]).await;

        let calc = calculator
            .calculate(&profile, &shop(), &CarrierAddress::postal_code_only("90001"), Currency::USD)
            .await
            .unwrap();
        assert_eq!(calc.matched.len(), 1);
        let rate = store.current_rate(&ground.id).await.unwrap().unwrap();
        assert_eq!(rate.amount, 1050);
    }

    #[tokio::test]
    async fn test_request_carries_accounts_and_currency() {
        let options = vec![
            ShippingOption::automatic("Ground", "UPS"),
            ShippingOption::automatic("2ndDayAir", "UPS"),
            ShippingOption::automatic("Express", "DHL"),
        ];
        let (calculator, service, _, profile) = setup(Vec::new(), options).await;

        let calc = calculator
            .calculate(&profile, &shop(), &CarrierAddress::postal_code_only("90001"), Currency::CAD)
            .await
            .unwrap();
        assert!(calc.is_empty());
        assert_eq!(calc.unavailable.len(), 3);

        let requests = service.requests.lock().unwrap();
        let accounts = requests[0].carrier_accounts.clone().unwrap();
        assert_eq!(accounts, vec![CarrierRegistry::builtin().account_id("UPS").unwrap().to_string()]);
        assert_eq!(requests[0].options.as_ref().unwrap().currency.as_deref(), Some("CAD"));
        assert_eq!(requests[0].parcel.weight, 16.0);
        assert!(!requests[0].is_purchase());
    }

    #[tokio::test]
    async fn test_custom_rate_profile_skips_service() {
        let (calculator, service, _, mut profile) = setup(Vec::new(), Vec::new()).await;
        profile.custom_rates = true;

        let calc = calculator
            .calculate(&profile, &shop(), &CarrierAddress::postal_code_only("90001"), Currency::USD)
            .await
            .unwrap();
        assert!(calc.shipment_id.is_none());
        assert!(service.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_parcel_is_an_error() {
        let (calculator, service, _, mut profile) = setup(Vec::new(), Vec::new()).await;
        profile.weight = None;

        let err = calculator
            .calculate(&profile, &shop(), &CarrierAddress::postal_code_only("90001"), Currency::USD)
            .await
            .unwrap_err();
        assert!(matches!(err, ShippingError::MissingParcel(_)));
        assert!(service.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_quotable_carrier_skips_service() {
        let unknown = ShippingOption::automatic("Ground", "PonyExpress");
        let (calculator, service, _, profile) = setup(Vec::new(), vec![unknown]).await;

        let calc = calculator
            .calculate(&profile, &shop(), &CarrierAddress::postal_code_only("90001"), Currency::USD)
            .await
            .unwrap();
        assert!(calc.shipment_id.is_none());
        assert_eq!(calc.unavailable.len(), 1);
        assert!(service.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_without_options_skips_service() {
        let (calculator, service, _, profile) = setup(Vec::new(), Vec::new()).await;

        let calc = calculator
            .calculate(&profile, &shop(), &CarrierAddress::postal_code_only("90001"), Currency::USD)
            .await
            .unwrap();
        assert!(calc.is_empty());
        assert!(calc.unavailable.is_empty());
        assert!(service.requests.lock().unwrap().is_empty());
    }
}

//! In-process stand-ins for the shipment service and billing gateway.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use turbo_shipping::prelude::*;
use turbo_shipping::service::{
    CarrierRate, ChargeOptions, ChargeReceipt, PostageLabel, Shipment, ShipmentRequest, Tracker,
};

/// Quotes from a fixed list; buys labels at a per-service price.
#[derive(Default)]
pub struct FakeShipments {
    pub shipment_id: String,
    pub quotes: Mutex<Vec<CarrierRate>>,
    /// Purchase price per service; services missing here fail to purchase.
    pub prices: Mutex<HashMap<String, String>>,
    pub requests: Mutex<Vec<ShipmentRequest>>,
}

impl FakeShipments {
    pub fn new(shipment_id: &str) -> Self {
        Self {
            shipment_id: shipment_id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_quote(self, carrier: &str, service: &str, rate: &str) -> Self {
        self.quotes.lock().unwrap().push(quote(carrier, service, rate));
        self
    }

    pub fn with_price(self, service: &str, rate: &str) -> Self {
        self.set_price(service, rate);
        self
    }

    pub fn set_price(&self, service: &str, rate: &str) {
        self.prices.lock().unwrap().insert(service.to_string(), rate.to_string());
    }

    pub fn set_quotes(&self, quotes: Vec<CarrierRate>) {
        *self.quotes.lock().unwrap() = quotes;
    }

    pub fn purchase_count(&self) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.is_purchase()).count()
    }
}

#[async_trait]
impl ShipmentService for FakeShipments {
    async fn create_shipment(&self, request: ShipmentRequest) -> Result<Shipment, ExternalServiceError> {
        self.requests.lock().unwrap().push(request.clone());

        let Some(service) = request.service.clone() else {
            return Ok(Shipment {
                id: self.shipment_id.clone(),
                rates: self.quotes.lock().unwrap().clone(),
                selected_rate: None,
                postage_label: None,
                tracker: None,
                messages: Vec::new(),
            });
        };

        let price = self
            .prices
            .lock()
            .unwrap()
            .get(&service)
            .cloned()
            .ok_or_else(|| ExternalServiceError::Http {
                status: 422,
                body: format!("{} unavailable", service),
            })?;
        let currency = request
            .options
            .as_ref()
            .and_then(|o| o.currency.clone())
            .unwrap_or_else(|| "USD".to_string());
        let n = self.purchase_count();
        Ok(Shipment {
            id: format!("{}_{}", self.shipment_id, n),
            rates: Vec::new(),
            selected_rate: Some(CarrierRate {
                id: format!("rate_{}", n),
                carrier: "USPS".to_string(),
                service: service.clone(),
                rate: price,
                currency,
                delivery_days: Some(2),
            }),
            postage_label: Some(PostageLabel {
                label_url: format!("https://labels.test/{}.png", n),
            }),
            tracker: Some(Tracker {
                id: None,
                tracking_code: format!("9400{}", n),
                status: None,
                tracking_details: None,
            }),
            messages: Vec::new(),
        })
    }
}

pub fn quote(carrier: &str, service: &str, rate: &str) -> CarrierRate {
    CarrierRate {
        id: format!("rate_{}_{}", carrier, service),
        carrier: carrier.to_string(),
        service: service.to_string(),
        rate: rate.to_string(),
        currency: "USD".to_string(),
        delivery_days: Some(3),
    }
}

/// Records charges; can be told to have no card or to decline.
#[derive(Default)]
pub struct FakeBilling {
    pub no_payment_method: bool,
    pub decline: bool,
    pub charges: Mutex<Vec<(i64, ChargeOptions)>>,
}

#[async_trait]
impl BillingGateway for FakeBilling {
    async fn default_payment_method(&self, _shop: &ShopId) -> Result<Option<PaymentMethodId>, ExternalServiceError> {
        if self.no_payment_method {
            return Ok(None);
        }
        Ok(Some(PaymentMethodId::new("pm_card")))
    }

    async fn charge(
        &self,
        amount: i64,
        _payment_method: &PaymentMethodId,
        options: ChargeOptions,
    ) -> Result<ChargeReceipt, ExternalServiceError> {
        if self.decline {
            return Err(ExternalServiceError::Http {
                status: 402,
                body: "card declined".to_string(),
            });
        }
        let receipt = ChargeReceipt {
            id: "ch_1".to_string(),
            amount,
            currency: options.currency.clone(),
        };
        self.charges.lock().unwrap().push((amount, options));
        Ok(receipt)
    }
}

pub fn shop() -> Shop {
    Shop {
        id: ShopId::new("shop_1"),
        name: "Acme Goods".to_string(),
        owner_email: "owner@acme.test".to_string(),
        currency: Currency::USD,
        dispatch_address: Some(
            ShippingAddress::new("Acme", "1 Main St", "Springfield", "IL", "62701", "US").with_phone("555-0100"),
        ),
    }
}

pub fn buyer() -> ShippingAddress {
    ShippingAddress::new("Sam Buyer", "22 Elm St", "Los Angeles", "CA", "90001", "US")
}

/// A store holding the shop, one weighted profile and the given options
/// attached to it.
pub async fn seeded_store(options: &[ShippingOption]) -> (Arc<InMemoryStore>, ShippingProfile) {
    let store = Arc::new(InMemoryStore::new());
    store.save_shop(shop()).await.unwrap();

    let profile = ShippingProfile::new_shared(ShopId::new("shop_1"), "Mugs").with_weight(1.0, "lb");
    store.save_profile(profile.clone()).await.unwrap();

    let ids: Vec<ShippingOptionId> = options.iter().map(|o| o.id.clone()).collect();
    for option in options {
        store.save_option(option.clone()).await.unwrap();
    }
    store.attach_options(&profile.id, &ids).await.unwrap();

    (store, profile)
}

pub fn registry() -> Arc<CarrierRegistry> {
    Arc::new(CarrierRegistry::builtin().clone())
}

//! Persistence for shops, profiles, options, rates, orders and shipments.
//!
//! [`ShippingStore`] is the seam a database backend implements.
//! [`InMemoryStore`] is the reference implementation used by the tests and
//! the CLI.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::ShippingError;
use crate::ids::{CarrierShipmentRecordId, OrderId, ShippingOptionId, ShippingOptionRateId, ShippingProfileId, ShopId};
use crate::order::{CarrierShipmentRecord, Order, OrderStatus, Shippable};
use crate::profile::{RateValues, ShippingOption, ShippingOptionRate, ShippingProfile, Shop};

/// Result type for store operations.
pub type StoreResult<T> = Result<T, ShippingError>;

/// Storage backend for shipping state.
///
/// Rates are written only through [`upsert_rate`](ShippingStore::upsert_rate)
/// and shipment records only appended; implementations must keep both
/// properties.
#[async_trait]
pub trait ShippingStore: Send + Sync {
    async fn save_shop(&self, shop: Shop) -> StoreResult<()>;

    async fn get_shop(&self, id: &ShopId) -> StoreResult<Option<Shop>>;

    /// Insert or replace a profile.
    async fn save_profile(&self, profile: ShippingProfile) -> StoreResult<()>;

    async fn get_profile(&self, id: &ShippingProfileId) -> StoreResult<Option<ShippingProfile>>;

    /// Insert or replace an option.
    async fn save_option(&self, option: ShippingOption) -> StoreResult<()>;

    async fn get_option(&self, id: &ShippingOptionId) -> StoreResult<Option<ShippingOption>>;

    /// Every carrier-backed option.
    async fn automatic_options(&self) -> StoreResult<Vec<ShippingOption>>;

    /// Associate options with a profile. Already-attached options are left
    /// alone.
    async fn attach_options(&self, profile: &ShippingProfileId, options: &[ShippingOptionId]) -> StoreResult<()>;

    async fn detach_options(&self, profile: &ShippingProfileId, options: &[ShippingOptionId]) -> StoreResult<()>;

    /// Options attached to a profile.
    async fn profile_options(&self, profile: &ShippingProfileId) -> StoreResult<Vec<ShippingOption>>;

    /// Create or update the rate keyed by `(option, carrier_shipment_id)`.
    ///
    /// Merchant-entered rates use `None` as the shipment id, so an option has
    /// at most one of them.
    async fn upsert_rate(
        &self,
        option: &ShippingOptionId,
        carrier_shipment_id: Option<&str>,
        values: RateValues,
    ) -> StoreResult<ShippingOptionRate>;

    /// The option's most recent rate.
    async fn current_rate(&self, option: &ShippingOptionId) -> StoreResult<Option<ShippingOptionRate>>;

    /// Every rate stored for an option, oldest first.
    async fn rates_for(&self, option: &ShippingOptionId) -> StoreResult<Vec<ShippingOptionRate>>;

    async fn insert_shipment(&self, record: CarrierShipmentRecord) -> StoreResult<()>;

    async fn shipments_for(&self, shippable: &Shippable) -> StoreResult<Vec<CarrierShipmentRecord>>;

    /// Stamp the given shipment records with the charge that billed them.
    async fn mark_shipments_charged(&self, records: &[CarrierShipmentRecordId], charge_id: &str) -> StoreResult<()>;

    async fn save_order(&self, order: Order) -> StoreResult<()>;

    async fn get_order(&self, id: &OrderId) -> StoreResult<Option<Order>>;

    async fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> StoreResult<()>;
}

#[derive(Default)]
struct Tables {
    shops: HashMap<ShopId, Shop>,
    profiles: HashMap<ShippingProfileId, ShippingProfile>,
    options: BTreeMap<ShippingOptionId, ShippingOption>,
    profile_options: HashMap<ShippingProfileId, BTreeSet<ShippingOptionId>>,
    rates: Vec<ShippingOptionRate>,
    shipments: Vec<CarrierShipmentRecord>,
    orders: HashMap<OrderId, Order>,
    revision: u64,
}

/// Process-local store.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rate rows, across every option.
    pub async fn rate_count(&self) -> usize {
        self.tables.read().await.rates.len()
    }

    /// Number of stored shipment records.
    pub async fn shipment_count(&self) -> usize {
        self.tables.read().await.shipments.len()
    }
}

#[async_trait]
impl ShippingStore for InMemoryStore {
    async fn save_shop(&self, shop: Shop) -> StoreResult<()> {
        self.tables.write().await.shops.insert(shop.id.clone(), shop);
        Ok(())
    }

    async fn get_shop(&self, id: &ShopId) -> StoreResult<Option<Shop>> {
        Ok(self.tables.read().await.shops.get(id).cloned())
    }

    async fn save_profile(&self, profile: ShippingProfile) -> StoreResult<()> {
        self.tables.write().await.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn get_profile(&self, id: &ShippingProfileId) -> StoreResult<Option<ShippingProfile>> {
        Ok(self.tables.read().await.profiles.get(id).cloned())
    }

    async fn save_option(&self, option: ShippingOption) -> StoreResult<()> {
        self.tables.write().await.options.insert(option.id.clone(), option);
        Ok(())
    }

    async fn get_option(&self, id: &ShippingOptionId) -> StoreResult<Option<ShippingOption>> {
        Ok(self.tables.read().await.options.get(id).cloned())
    }

    async fn automatic_options(&self) -> StoreResult<Vec<ShippingOption>> {
        let tables = self.tables.read().await;
        Ok(tables.options.values().filter(|o| o.is_automatic()).cloned().collect())
    }

    async fn attach_options(&self, profile: &ShippingProfileId, options: &[ShippingOptionId]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(missing) = options.iter().find(|id| !tables.options.contains_key(*id)) {
            return Err(ShippingError::Store(format!("unknown shipping option {}", missing)));
        }
        tables
            .profile_options
            .entry(profile.clone())
            .or_default()
            .extend(options.iter().cloned());
        Ok(())
    }

    async fn detach_options(&self, profile: &ShippingProfileId, options: &[ShippingOptionId]) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(attached) = tables.profile_options.get_mut(profile) {
            for id in options {
                attached.remove(id);
            }
        }
        Ok(())
    }

    async fn profile_options(&self, profile: &ShippingProfileId) -> StoreResult<Vec<ShippingOption>> {
        let tables = self.tables.read().await;
        let Some(ids) = tables.profile_options.get(profile) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| tables.options.get(id).cloned()).collect())
    }

    async fn upsert_rate(
        &self,
        option: &ShippingOptionId,
        carrier_shipment_id: Option<&str>,
        values: RateValues,
    ) -> StoreResult<ShippingOptionRate> {
        let mut tables = self.tables.write().await;

        let existing = tables.rates.iter_mut().find(|rate| {
            rate.shipping_option_id == *option && rate.carrier_shipment_id.as_deref() == carrier_shipment_id
        });
        if let Some(rate) = existing {
            rate.amount = values.amount;
            rate.currency = values.currency;
            rate.delivery_days = values.delivery_days;
            rate.carrier_rate_id = values.carrier_rate_id;
            return Ok(rate.clone());
        }

        tables.revision += 1;
        let rate = ShippingOptionRate {
            id: ShippingOptionRateId::generate(),
            shipping_option_id: option.clone(),
            amount: values.amount,
            currency: values.currency,
            delivery_days: values.delivery_days,
            carrier_shipment_id: carrier_shipment_id.map(str::to_string),
            carrier_rate_id: values.carrier_rate_id,
            created_at: Utc::now(),
            revision: tables.revision,
        };
        tables.rates.push(rate.clone());
        Ok(rate)
    }

    async fn current_rate(&self, option: &ShippingOptionId) -> StoreResult<Option<ShippingOptionRate>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rates
            .iter()
            .filter(|rate| rate.shipping_option_id == *option)
            .max_by_key(|rate| rate.recency())
            .cloned())
    }

    async fn rates_for(&self, option: &ShippingOptionId) -> StoreResult<Vec<ShippingOptionRate>> {
        let tables = self.tables.read().await;
        let mut rates: Vec<_> = tables
            .rates
            .iter()
            .filter(|rate| rate.shipping_option_id == *option)
            .cloned()
            .collect();
        rates.sort_by_key(|rate| rate.recency());
        Ok(rates)
    }

    async fn insert_shipment(&self, record: CarrierShipmentRecord) -> StoreResult<()> {
        self.tables.write().await.shipments.push(record);
        Ok(())
    }

    async fn shipments_for(&self, shippable: &Shippable) -> StoreResult<Vec<CarrierShipmentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .shipments
            .iter()
            .filter(|record| record.shippable == *shippable)
            .cloned()
            .collect())
    }

    async fn mark_shipments_charged(&self, records: &[CarrierShipmentRecordId], charge_id: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        for record in tables.shipments.iter_mut().filter(|r| records.contains(&r.id)) {
            record.charge_id = Some(charge_id.to_string());
        }
        Ok(())
    }

    async fn save_order(&self, order: Order) -> StoreResult<()> {
        self.tables.write().await.orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn get_order(&self, id: &OrderId) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(id).cloned())
    }

    async fn set_order_status(&self, id: &OrderId, status: OrderStatus) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(id)
            .ok_or_else(|| ShippingError::Store(format!("unknown order {}", id)))?;
        order.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(amount: i64) -> RateValues {
        RateValues {
            amount,
            currency: "usd".to_string(),
            delivery_days: Some(3),
            carrier_rate_id: Some(format!("rate_{amount}")),
        }
    }

    #[tokio::test]
    async fn test_upsert_same_shipment_updates_in_place() {
        let store = InMemoryStore::new();
        let option = ShippingOptionId::new("opt");

        let first = store.upsert_rate(&option, Some("shp_1"), values(1000)).await.unwrap();
        let second = store.upsert_rate(&option, Some("shp_1"), values(1200)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.rate_count().await, 1);
        assert_eq!(store.current_rate(&option).await.unwrap().unwrap().amount, 1200);
    }

    #[tokio::test]
    async fn test_newest_shipment_is_current() {
        let store = InMemoryStore::new();
        let option = ShippingOptionId::new("opt");

        store.upsert_rate(&option, Some("shp_1"), values(1000)).await.unwrap();
        store.upsert_rate(&option, Some("shp_2"), values(900)).await.unwrap();
        // Refreshing the older quote does not make it current again.
        store.upsert_rate(&option, Some("shp_1"), values(1100)).await.unwrap();

        let current = store.current_rate(&option).await.unwrap().unwrap();
        assert_eq!(current.carrier_shipment_id.as_deref(), Some("shp_2"));
        assert_eq!(store.rates_for(&option).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let store = InMemoryStore::new();
        let option = ShippingOption::automatic("Ground", "UPS");
        let profile = ShippingProfileId::new("p");
        store.save_option(option.clone()).await.unwrap();

        store.attach_options(&profile, &[option.id.clone()]).await.unwrap();
        store.attach_options(&profile, &[option.id.clone()]).await.unwrap();
        assert_eq!(store.profile_options(&profile).await.unwrap().len(), 1);

        store.detach_options(&profile, &[option.id.clone()]).await.unwrap();
        assert!(store.profile_options(&profile).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_unknown_option_fails() {
        let store = InMemoryStore::new();
        let err = store
            .attach_options(&ShippingProfileId::new("p"), &[ShippingOptionId::new("nope")])
            .await
            .unwrap_err();
        assert!(matches!(err, ShippingError::Store(_)));
    }

    #[tokio::test]
    async fn test_unknown_order_status_update_fails() {
        let store = InMemoryStore::new();
        assert!(store
            .set_order_status(&OrderId::new("missing"), OrderStatus::ReadyToShip)
            .await
            .is_err());
    }

    fn record(line: &str) -> CarrierShipmentRecord {
        CarrierShipmentRecord {
            id: CarrierShipmentRecordId::generate(),
            shippable: Shippable::OrderProduct(crate::ids::OrderLineItemId::new(line)),
            shipping_option_id: ShippingOptionId::new("opt"),
            carrier_shipment_id: format!("shp_{line}"),
            postage_label_url: "https://labels.test/1.png".to_string(),
            tracking_code: None,
            tracking_details: None,
            amount: Some(425),
            currency: "USD".to_string(),
            charge_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mark_shipments_charged_only_touches_listed_records() {
        let store = InMemoryStore::new();
        let billed = record("a");
        let other = record("b");
        store.insert_shipment(billed.clone()).await.unwrap();
        store.insert_shipment(other.clone()).await.unwrap();

        store.mark_shipments_charged(&[billed.id.clone()], "ch_1").await.unwrap();

        let a = store.shipments_for(&billed.shippable).await.unwrap();
        assert_eq!(a[0].charge_id.as_deref(), Some("ch_1"));
        let b = store.shipments_for(&other.shippable).await.unwrap();
        assert!(!b[0].is_charged());
    }
}

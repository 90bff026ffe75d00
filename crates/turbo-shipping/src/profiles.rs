//! Creating, assigning and configuring shipping profiles.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::carrier::CarrierRegistry;
use crate::error::ShippingError;
use crate::ids::{OrderId, OrderLineItemId, ShippingOptionId, ShippingProfileId};
use crate::money::Money;
use crate::profile::{RateValues, ShippingOption, ShippingOptionRate, ShippingProfile, Shop};
use crate::store::ShippingStore;
use crate::validation::{AddressValidator, ParcelValidator, ProfileInput, ProfileValidator, ValidationErrors};

const MAX_NAME_LEN: usize = 255;

/// A merchant-defined option and its fixed rate, as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomOptionInput {
    /// Existing option to update; None creates one.
    #[serde(default)]
    pub id: Option<ShippingOptionId>,
    pub name: String,
    /// Major units, e.g. "7.50".
    pub rate_amount: String,
    #[serde(default)]
    pub rate_delivery_days: Option<u32>,
}

/// An option a buyer can pick, with its current price.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableOption {
    pub option: ShippingOption,
    pub rate: ShippingOptionRate,
}

/// Store-backed profile operations.
#[derive(Clone)]
pub struct ProfileManager {
    store: Arc<dyn ShippingStore>,
    registry: Arc<CarrierRegistry>,
    profiles: ProfileValidator,
    parcels: ParcelValidator,
    dispatch_addresses: AddressValidator,
}

impl ProfileManager {
    pub fn new(store: Arc<dyn ShippingStore>, registry: Arc<CarrierRegistry>, profiles: ProfileValidator) -> Self {
        Self {
            store,
            registry,
            profiles,
            parcels: ParcelValidator::new(),
            dispatch_addresses: AddressValidator::offline().for_dispatch(),
        }
    }

    /// Check parcels against live carrier limits too.
    pub fn with_parcel_validator(mut self, parcels: ParcelValidator) -> Self {
        self.parcels = parcels;
        self
    }

    /// Verify dispatch addresses with this validator. Dispatch rules
    /// (phone required) are applied on top.
    pub fn with_address_validator(mut self, addresses: AddressValidator) -> Self {
        self.dispatch_addresses = addresses.for_dispatch();
        self
    }

    /// Create a named catalog-level profile.
    #[instrument(skip(self, shop), fields(shop = %shop.id))]
    pub async fn create_shared(&self, shop: &Shop, name: &str) -> Result<ShippingProfile, ShippingError> {
        let mut errors = ValidationErrors::new();
        if name.trim().is_empty() {
            errors.add("name", "The name field is required.");
        } else if name.chars().count() > MAX_NAME_LEN {
            errors.add(
                "name",
                format!("The name field must not be greater than {} characters.", MAX_NAME_LEN),
            );
        }
        errors.into_result()?;

        let profile = ShippingProfile::new_shared(shop.id.clone(), name.trim());
        self.insert(profile).await
    }

    /// Give one order line its own profile.
    ///
    /// Reuses `existing` when it belongs to the shop, otherwise creates a
    /// one-off profile. The line is re-pointed at the profile before the
    /// submitted fields are saved onto it.
    #[instrument(skip(self, shop, input), fields(shop = %shop.id, order = %order_id, line_item = %line_item_id))]
    pub async fn assign(
        &self,
        shop: &Shop,
        order_id: &OrderId,
        line_item_id: &OrderLineItemId,
        existing: Option<&ShippingProfileId>,
        input: &ProfileInput,
    ) -> Result<ShippingProfile, ShippingError> {
        self.profiles.validate(input)?;

        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| ShippingError::Store(format!("unknown order {}", order_id)))?;
        let index = order
            .line_items
            .iter()
            .position(|item| item.id == *line_item_id)
            .ok_or_else(|| ShippingError::Store(format!("unknown line item {}", line_item_id)))?;

        let found = match existing {
            Some(id) => self.store.get_profile(id).await?.filter(|p| p.shop_id == shop.id),
            None => None,
        };

        let origin = input
            .dispatch_address
            .as_ref()
            .or_else(|| found.as_ref().and_then(|p| p.dispatch_address.as_ref()))
            .or(shop.dispatch_address.as_ref())
            .map(|address| address.postal_code.clone());
        self.parcels.validate_live(&input.parcel, origin.as_deref()).await?;

        let profile = match found {
            Some(profile) => profile,
            None => self.insert(ShippingProfile::one_off(shop.id.clone())).await?,
        };

        order.line_items[index].shipping_profile_id = Some(profile.id.clone());
        self.store.save_order(order).await?;

        self.update(profile, input).await
    }

    /// Save submitted fields onto a profile.
    ///
    /// The profile fields are stored before the dispatch address is
    /// validated, so a bad address does not lose the rest of the form.
    pub async fn update(
        &self,
        mut profile: ShippingProfile,
        input: &ProfileInput,
    ) -> Result<ShippingProfile, ShippingError> {
        self.profiles.validate(input)?;

        let fields = ProfileInput {
            dispatch_address: None,
            ..input.clone()
        };
        fields.apply_to(&mut profile)?;
        self.store.save_profile(profile.clone()).await?;

        if let Some(address) = &input.dispatch_address {
            self.dispatch_addresses.validate(address).await?;
            profile.dispatch_address = Some(address.clone());
            self.store.save_profile(profile.clone()).await?;
        }

        Ok(profile)
    }

    /// Make exactly `ids` the profile's options, switching it to carrier
    /// rates.
    #[instrument(skip(self, ids), fields(profile = %profile_id))]
    pub async fn sync_automatic_options(
        &self,
        profile_id: &ShippingProfileId,
        ids: &[ShippingOptionId],
    ) -> Result<(), ShippingError> {
        let mut profile = self.load(profile_id).await?;

        let mut errors = ValidationErrors::new();
        for (i, id) in ids.iter().enumerate() {
            let option = self.store.get_option(id).await?;
            if !option.is_some_and(|o| o.is_automatic()) {
                let field = format!("automatic_shipping_option_ids.{}", i);
                let message = format!("The selected {} is invalid.", field);
                errors.add(field, message);
            }
        }
        errors.into_result()?;

        let keep: BTreeSet<&ShippingOptionId> = ids.iter().collect();
        let stale: Vec<ShippingOptionId> = self
            .store
            .profile_options(profile_id)
            .await?
            .into_iter()
            .map(|o| o.id)
            .filter(|id| !keep.contains(id))
            .collect();

        self.store.detach_options(profile_id, &stale).await?;
        self.store.attach_options(profile_id, ids).await?;

        profile.custom_rates = false;
        self.store.save_profile(profile).await
    }

    /// Replace the profile's options with merchant-defined ones at fixed
    /// rates in the shop's currency.
    ///
    /// Entries with an id rename that option; entries without one create
    /// it. Options not listed are detached.
    #[instrument(skip(self, shop, entries), fields(profile = %profile_id, entries = entries.len()))]
    pub async fn save_custom_options(
        &self,
        profile_id: &ShippingProfileId,
        shop: &Shop,
        entries: &[CustomOptionInput],
    ) -> Result<Vec<ShippingOption>, ShippingError> {
        let mut profile = self.load(profile_id).await?;
        let attached = self.store.profile_options(profile_id).await?;

        let mut errors = ValidationErrors::new();
        let mut amounts = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if entry.name.trim().is_empty() {
                errors.add(
                    format!("custom_shipping_option_data.{}.name", i),
                    "The option name field is required.",
                );
            }
            if let Some(id) = &entry.id {
                if !attached.iter().any(|o| o.id == *id && !o.is_automatic()) {
                    errors.add(
                        format!("custom_shipping_option_data.{}.id", i),
                        format!("The selected custom_shipping_option_data.{}.id is invalid.", i),
                    );
                }
            }
            match Money::parse_decimal(&entry.rate_amount, shop.currency) {
                Ok(money) if money.amount >= 0 => amounts.push(money.amount),
                _ => errors.add(
                    format!("custom_shipping_option_data.{}.rate_amount", i),
                    "The option rate field must be a number.",
                ),
            }
        }
        errors.into_result()?;

        let mut saved = Vec::with_capacity(entries.len());
        for (entry, amount) in entries.iter().zip(amounts) {
            let option = match attached.iter().find(|o| Some(&o.id) == entry.id.as_ref()) {
                Some(existing) => ShippingOption {
                    name: entry.name.trim().to_string(),
                    ..existing.clone()
                },
                None => ShippingOption::custom(entry.name.trim(), shop.id.clone()),
            };
            self.store.save_option(option.clone()).await?;
            self.store.attach_options(profile_id, &[option.id.clone()]).await?;
            self.store
                .upsert_rate(
                    &option.id,
                    None,
                    RateValues {
                        amount,
                        currency: shop.currency.code().to_string(),
                        delivery_days: entry.rate_delivery_days.filter(|days| *days > 0),
                        carrier_rate_id: None,
                    },
                )
                .await?;
            saved.push(option);
        }

        let keep: BTreeSet<&ShippingOptionId> = saved.iter().map(|o| &o.id).collect();
        let removed: Vec<ShippingOptionId> = attached
            .iter()
            .map(|o| o.id.clone())
            .filter(|id| !keep.contains(id))
            .collect();
        self.store.detach_options(profile_id, &removed).await?;

        profile.custom_rates = true;
        self.store.save_profile(profile).await?;

        info!(saved = saved.len(), removed = removed.len(), "custom shipping options saved");
        Ok(saved)
    }

    /// Options a buyer can choose for `profile`: those with a current rate,
    /// and for carrier options, whose carrier ships from the profile's
    /// origin country.
    pub async fn available_options(
        &self,
        profile: &ShippingProfile,
        shop: &Shop,
    ) -> Result<Vec<AvailableOption>, ShippingError> {
        let origin = profile.origin_country(shop);
        let mut available = Vec::new();

        for option in self.store.profile_options(&profile.id).await? {
            if option.is_automatic() == profile.custom_rates {
                continue;
            }
            if let Some(carrier) = option.carrier.as_deref() {
                let ships = origin.is_some_and(|country| {
                    self.registry
                        .get(carrier)
                        .is_some_and(|c| c.enabled && c.ships_from(country))
                });
                if !ships {
                    continue;
                }
            }
            if let Some(rate) = self.store.current_rate(&option.id).await? {
                available.push(AvailableOption { option, rate });
            }
        }

        Ok(available)
    }

    async fn load(&self, id: &ShippingProfileId) -> Result<ShippingProfile, ShippingError> {
        self.store
            .get_profile(id)
            .await?
            .ok_or_else(|| ShippingError::Store(format!("unknown shipping profile {}", id)))
    }

    /// Store a new profile and enroll it in every automatic option.
    async fn insert(&self, profile: ShippingProfile) -> Result<ShippingProfile, ShippingError> {
        self.store.save_profile(profile.clone()).await?;
        let automatic: Vec<ShippingOptionId> = self
            .store
            .automatic_options()
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();
        self.store.attach_options(&profile.id, &automatic).await?;
        info!(profile = %profile.id, options = automatic.len(), "shipping profile created");
        Ok(profile)
    }
}

/// Create an automatic option for every registry service not yet in the
/// store. Returns how many were created.
pub async fn seed_carrier_options(store: &dyn ShippingStore, registry: &CarrierRegistry) -> Result<usize, ShippingError> {
    let existing: BTreeSet<(String, String)> = store
        .automatic_options()
        .await?
        .into_iter()
        .filter_map(|o| Some((o.carrier?, o.name)))
        .collect();

    let mut created = 0;
    for (key, carrier) in registry.iter() {
        if !carrier.enabled {
            warn!(carrier = key, "skipping disabled carrier");
            continue;
        }
        for service in &carrier.services {
            if existing.contains(&(key.to_string(), service.clone())) {
                continue;
            }
            store.save_option(ShippingOption::automatic(service.clone(), key)).await?;
            created += 1;
        }
    }
    Ok(created)
}

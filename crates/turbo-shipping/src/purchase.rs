//! Bulk label purchase for an order.
//!
//! Every unit of every shippable line is its own package and gets its own
//! label. Units are bought concurrently, bounded by the configured
//! concurrency, and each succeeds or fails on its own. Bought labels are
//! never rolled back: a carrier label cannot be un-bought.
//!
//! Units that already have a label from an earlier attempt are not bought
//! again, so a retry after a partial failure only buys the remainder.
//!
//! Only when every unit has a label does the order move to ready-to-ship and
//! the merchant get charged for every label not yet billed. The payment
//! method is resolved before the status change so a merchant without one is
//! not left with an advanced, unbillable order.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::address::CarrierAddress;
use crate::carrier::CarrierRegistry;
use crate::config::{PurchaseConfig, Timeouts};
use crate::error::{ExternalService, ExternalServiceError, ShippingError};
use crate::ids::{CarrierShipmentRecordId, OrderId, OrderLineItemId, ShopId};
use crate::money::{decimal_places_for, to_minor_units};
use crate::order::{CarrierShipmentRecord, Order, OrderLineItem, OrderStatus, Shippable};
use crate::profile::{ShippingOption, Shop};
use crate::service::{match_key, BillingGateway, ChargeOptions, ChargeReceipt, Shipment, ShipmentRequest, ShipmentService};
use crate::store::ShippingStore;

/// One package's purchase outcome.
#[derive(Debug, Clone)]
pub struct UnitResult {
    pub line_item: OrderLineItemId,
    /// Position of the line in the order.
    pub line_index: usize,
    /// Which unit of the line's quantity, from zero.
    pub unit: u32,
    /// The label came from an earlier attempt rather than this one.
    pub already_purchased: bool,
    pub outcome: Result<CarrierShipmentRecord, ShippingError>,
}

impl UnitResult {
    pub fn is_purchased(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// What happened to the charge after the labels were bought.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingOutcome {
    /// Some unit failed, or there was nothing to charge.
    NotAttempted,
    Charged(ChargeReceipt),
    /// The shop has no default payment method; the order was left as is.
    NoPaymentMethod,
    /// A label is priced in a currency other than the shop's; the order was
    /// left as is.
    CurrencyMismatch { expected: String, found: String },
    /// The order status could not be updated, so no charge was made.
    StatusNotUpdated(String),
    /// The billing service failed.
    Failed {
        amount: i64,
        status_advanced: bool,
        source: ExternalServiceError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Danger,
}

/// The single message shown to the merchant after a purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

/// The result of buying labels for an order.
#[derive(Debug, Clone)]
pub struct PurchaseResult {
    pub order_id: OrderId,
    pub shop_id: ShopId,
    /// Per-unit outcomes, in line order then unit order.
    pub units: Vec<UnitResult>,
    pub status_advanced: bool,
    pub billing: BillingOutcome,
}

impl PurchaseResult {
    /// Records for the units that succeeded.
    pub fn records(&self) -> impl Iterator<Item = &CarrierShipmentRecord> {
        self.units.iter().filter_map(|u| u.outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitResult> {
        self.units.iter().filter(|u| u.outcome.is_err())
    }

    pub fn purchased_count(&self) -> usize {
        self.records().count()
    }

    /// Labels bought by this attempt.
    pub fn newly_purchased_count(&self) -> usize {
        self.units
            .iter()
            .filter(|u| u.is_purchased() && !u.already_purchased)
            .count()
    }

    /// Whether every unit got a label.
    pub fn is_complete(&self) -> bool {
        self.units.iter().all(UnitResult::is_purchased)
    }

    /// Sum of the prices of labels not yet charged to the merchant, in minor
    /// units.
    pub fn total_amount(&self) -> i64 {
        self.records()
            .filter(|r| !r.is_charged())
            .filter_map(|r| r.amount)
            .sum()
    }

    pub fn notification(&self) -> Notification {
        if self.units.is_empty() {
            return Notification {
                level: NotificationLevel::Danger,
                message: "There are no items on this order that need a shipping label.".to_string(),
            };
        }
        if !self.is_complete() {
            return Notification {
                level: NotificationLevel::Danger,
                message: "Oops! There was a problem purchasing some of your shipping labels, please try again."
                    .to_string(),
            };
        }

        let purchased = format!("Shipping labels purchased for {} packages", self.purchased_count());
        match &self.billing {
            BillingOutcome::NotAttempted | BillingOutcome::Charged(_) => Notification {
                level: NotificationLevel::Success,
                message: purchased,
            },
            BillingOutcome::NoPaymentMethod => Notification {
                level: NotificationLevel::Danger,
                message: format!("{}, but there is no payment method on file to charge.", purchased),
            },
            BillingOutcome::CurrencyMismatch { expected, found } => Notification {
                level: NotificationLevel::Danger,
                message: format!(
                    "{}, but they are priced in {} and cannot be charged in {}.",
                    purchased, found, expected
                ),
            },
            BillingOutcome::StatusNotUpdated(_) | BillingOutcome::Failed { .. } => Notification {
                level: NotificationLevel::Danger,
                message: format!("{}, but the shipping charge could not be completed.", purchased),
            },
        }
    }

    /// The batch-level failure, if any.
    pub fn error(&self) -> Option<ShippingError> {
        if self.units.is_empty() {
            return Some(ShippingError::NothingToShip(self.order_id.to_string()));
        }
        if !self.is_complete() {
            return Some(ShippingError::PartialPurchaseFailure {
                purchased: self.purchased_count(),
                total: self.units.len(),
                failures: self
                    .failures()
                    .filter_map(|u| u.outcome.as_ref().err())
                    .map(ToString::to_string)
                    .collect(),
            });
        }

        match &self.billing {
            BillingOutcome::NotAttempted | BillingOutcome::Charged(_) => None,
            BillingOutcome::NoPaymentMethod => Some(ShippingError::NoPaymentMethod(self.shop_id.to_string())),
            BillingOutcome::CurrencyMismatch { expected, found } => Some(ShippingError::ChargeCurrencyMismatch {
                expected: expected.clone(),
                found: found.clone(),
            }),
            BillingOutcome::StatusNotUpdated(reason) => Some(ShippingError::Store(reason.clone())),
            BillingOutcome::Failed {
                amount,
                status_advanced,
                source,
            } => Some(ShippingError::BillingFailure {
                order_id: self.order_id.to_string(),
                amount: *amount,
                status_advanced: *status_advanced,
                source: source.clone(),
            }),
        }
    }
}

/// A resolved line: everything needed to buy its units.
struct LinePlan {
    option: ShippingOption,
    request: ShipmentRequest,
}

struct UnitJob<'a> {
    line_index: usize,
    unit: u32,
    item: &'a OrderLineItem,
    plan: &'a Result<LinePlan, ShippingError>,
}

/// Buys labels for orders and bills the merchant.
#[derive(Clone)]
pub struct LabelPurchaser {
    service: Arc<dyn ShipmentService>,
    billing: Arc<dyn BillingGateway>,
    store: Arc<dyn ShippingStore>,
    registry: Arc<CarrierRegistry>,
    timeouts: Timeouts,
    concurrency: usize,
}

impl LabelPurchaser {
    pub fn new(
        service: Arc<dyn ShipmentService>,
        billing: Arc<dyn BillingGateway>,
        store: Arc<dyn ShippingStore>,
        registry: Arc<CarrierRegistry>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            service,
            billing,
            store,
            registry,
            timeouts,
            concurrency: PurchaseConfig::default().concurrency,
        }
    }

    /// Labels bought at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Buy a label for every unit of `order`'s shippable lines that does not
    /// have one yet.
    ///
    /// Unit failures are reported in the result, not as an error. An error
    /// means nothing was attempted: the order, its shop or its existing
    /// labels could not be loaded.
    #[instrument(skip_all, fields(order = %order_id))]
    pub async fn purchase_labels(&self, order_id: &OrderId) -> Result<PurchaseResult, ShippingError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| ShippingError::Store(format!("unknown order {}", order_id)))?;
        let shop = self
            .store
            .get_shop(&order.shop_id)
            .await?
            .ok_or_else(|| ShippingError::Store(format!("unknown shop {}", order.shop_id)))?;

        let destination = CarrierAddress::recipient(&order.delivery_address);
        let mut units = Vec::new();
        let mut plans = Vec::new();
        for (line_index, item) in order.line_items.iter().enumerate() {
            if !item.requires_shipping {
                continue;
            }

            let existing = self.store.shipments_for(&item.shippable).await?;
            let first_unit = existing.len() as u32;
            units.extend(
                existing
                    .into_iter()
                    .enumerate()
                    .map(|(unit, record)| earlier_unit(item, line_index, unit as u32, record)),
            );
            if first_unit >= item.quantity {
                debug!(line_item = %item.id, "every unit already has a label");
                continue;
            }

            let plan = self.plan_line(item, &order, &shop, &destination).await;
            if let Err(e) = &plan {
                warn!(line_item = %item.id, error = %e, "cannot purchase labels for line");
            }
            plans.push((line_index, item, first_unit, plan));
        }

        let jobs: Vec<UnitJob<'_>> = plans
            .iter()
            .flat_map(|(line_index, item, first_unit, plan)| {
                (*first_unit..item.quantity).map(move |unit| UnitJob {
                    line_index: *line_index,
                    unit,
                    item,
                    plan,
                })
            })
            .collect();

        let bought: Vec<UnitResult> = stream::iter(jobs)
            .map(|job| self.run_job(job, &order))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        units.extend(bought);
        units.sort_by_key(|u| (u.line_index, u.unit));

        let mut result = PurchaseResult {
            order_id: order.id.clone(),
            shop_id: shop.id.clone(),
            units,
            status_advanced: false,
            billing: BillingOutcome::NotAttempted,
        };

        if result.units.is_empty() {
            info!("order has nothing to ship");
            return Ok(result);
        }

        if !result.is_complete() {
            warn!(
                purchased = result.purchased_count(),
                total = result.units.len(),
                "some shipping labels could not be purchased"
            );
            return Ok(result);
        }

        let unbilled: Vec<&CarrierShipmentRecord> = result.records().filter(|r| !r.is_charged()).collect();
        let amount = result.total_amount();
        let (status_advanced, billing) = self.settle(&order, &shop, &unbilled, amount).await;

        if let BillingOutcome::Charged(receipt) = &billing {
            for record in result.units.iter_mut().filter_map(|u| u.outcome.as_mut().ok()) {
                if !record.is_charged() {
                    record.charge_id = Some(receipt.id.clone());
                }
            }
        }
        result.status_advanced = status_advanced;
        result.billing = billing;

        info!(
            packages = result.purchased_count(),
            bought = result.newly_purchased_count(),
            amount,
            status_advanced,
            "shipping labels purchased"
        );
        Ok(result)
    }

    async fn plan_line(
        &self,
        item: &OrderLineItem,
        order: &Order,
        shop: &Shop,
        destination: &CarrierAddress,
    ) -> Result<LinePlan, ShippingError> {
        let profile_id = item
            .effective_profile_id()
            .ok_or_else(|| ShippingError::MissingShippingProfile(item.id.to_string()))?;
        let profile = self
            .store
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| ShippingError::MissingShippingProfile(item.id.to_string()))?;

        let option_id = item
            .shipping_option_id
            .as_ref()
            .ok_or_else(|| ShippingError::MissingShippingOption(item.id.to_string()))?;
        let option = self
            .store
            .get_option(option_id)
            .await?
            .ok_or_else(|| ShippingError::MissingShippingOption(item.id.to_string()))?;

        let account = option
            .carrier_account_id(&self.registry)
            .ok_or_else(|| ShippingError::UnknownCarrier(option.carrier.clone().unwrap_or_default()))?;

        let request = ShipmentRequest::new(
            profile.dispatch_payload(shop)?,
            destination.clone(),
            profile.parcel_payload()?,
        )
        .with_service(option.name.clone())
        .with_carrier_accounts(vec![account.to_string()])
        .with_currency(order.currency.code());

        Ok(LinePlan { option, request })
    }

    async fn run_job(&self, job: UnitJob<'_>, order: &Order) -> UnitResult {
        let outcome = match job.plan {
            Ok(plan) => self.purchase_unit(plan, &job.item.shippable, order).await,
            Err(e) => Err(e.clone()),
        };
        if let Err(e) = &outcome {
            debug!(line_item = %job.item.id, unit = job.unit, error = %e, "unit purchase failed");
        }
        UnitResult {
            line_item: job.item.id.clone(),
            line_index: job.line_index,
            unit: job.unit,
            already_purchased: false,
            outcome,
        }
    }

    /// Buy one label and record it.
    #[instrument(skip_all, fields(shippable = %shippable.id(), service = %plan.option.name))]
    async fn purchase_unit(
        &self,
        plan: &LinePlan,
        shippable: &Shippable,
        order: &Order,
    ) -> Result<CarrierShipmentRecord, ShippingError> {
        let shipment = self
            .timeouts
            .run(ExternalService::Shipment, self.service.create_shipment(plan.request.clone()))
            .await
            .map_err(|e| ShippingError::external(ExternalService::Shipment, e))?;

        let label = shipment
            .postage_label
            .as_ref()
            .ok_or_else(|| ShippingError::LabelNotPurchased(shipment.id.clone()))?;

        let price = match purchased_price(&shipment, &plan.option)? {
            Some(price) => Some(price),
            None => self
                .store
                .current_rate(&plan.option.id)
                .await?
                .map(|rate| (rate.amount, rate.currency)),
        };

        let record = CarrierShipmentRecord {
            id: CarrierShipmentRecordId::generate(),
            shippable: shippable.clone(),
            shipping_option_id: plan.option.id.clone(),
            carrier_shipment_id: shipment.id.clone(),
            postage_label_url: label.label_url.clone(),
            tracking_code: shipment.tracker.as_ref().map(|t| t.tracking_code.clone()),
            tracking_details: shipment.tracker.as_ref().and_then(|t| t.tracking_details.clone()),
            amount: price.as_ref().map(|(amount, _)| *amount),
            currency: price
                .map(|(_, currency)| currency)
                .unwrap_or_else(|| order.currency.code().to_string()),
            charge_id: None,
            created_at: Utc::now(),
        };
        self.store.insert_shipment(record.clone()).await?;

        if record.amount.is_none() {
            error!(shipment = %shipment.id, "label purchased but its price is unknown");
            return Err(ShippingError::LabelUnpriced(shipment.id));
        }
        Ok(record)
    }

    /// Resolve the payment method, advance the order, charge the unbilled
    /// labels and stamp them with the charge.
    async fn settle(
        &self,
        order: &Order,
        shop: &Shop,
        unbilled: &[&CarrierShipmentRecord],
        amount: i64,
    ) -> (bool, BillingOutcome) {
        let expected = shop.currency.code();
        if let Some(record) = unbilled.iter().find(|r| !r.currency.eq_ignore_ascii_case(expected)) {
            warn!(
                expected,
                found = %record.currency,
                shipment = %record.carrier_shipment_id,
                "label currency differs from shop currency; order left unchanged"
            );
            return (
                false,
                BillingOutcome::CurrencyMismatch {
                    expected: expected.to_string(),
                    found: record.currency.to_uppercase(),
                },
            );
        }

        if amount <= 0 {
            if let Err(e) = self.advance(order).await {
                return (false, BillingOutcome::StatusNotUpdated(e.to_string()));
            }
            return (true, BillingOutcome::NotAttempted);
        }

        let payment_method = match self
            .timeouts
            .run(ExternalService::Billing, self.billing.default_payment_method(&shop.id))
            .await
        {
            Ok(Some(method)) => method,
            Ok(None) => {
                warn!(shop = %shop.id, "no default payment method; order left unchanged");
                return (false, BillingOutcome::NoPaymentMethod);
            }
            Err(source) => {
                error!(error = %source, "payment method lookup failed; order left unchanged");
                return (
                    false,
                    BillingOutcome::Failed {
                        amount,
                        status_advanced: false,
                        source,
                    },
                );
            }
        };

        if let Err(e) = self.advance(order).await {
            error!(error = %e, "could not mark order ready to ship; not charging");
            return (false, BillingOutcome::StatusNotUpdated(e.to_string()));
        }

        let options = ChargeOptions {
            currency: shop.currency.code().to_string(),
            description: format!("Shipping for order {}", order.id),
        };
        match self
            .timeouts
            .run(ExternalService::Billing, self.billing.charge(amount, &payment_method, options))
            .await
        {
            Ok(receipt) => {
                let ids: Vec<CarrierShipmentRecordId> = unbilled.iter().map(|r| r.id.clone()).collect();
                if let Err(e) = self.store.mark_shipments_charged(&ids, &receipt.id).await {
                    error!(error = %e, charge = %receipt.id, "charged but could not mark labels as billed");
                }
                (true, BillingOutcome::Charged(receipt))
            }
            Err(source) => {
                error!(error = %source, amount, "shipping charge failed after labels were purchased");
                (
                    true,
                    BillingOutcome::Failed {
                        amount,
                        status_advanced: true,
                        source,
                    },
                )
            }
        }
    }

    /// Move a pending order to ready-to-ship. Orders already past pending are
    /// left where they are.
    async fn advance(&self, order: &Order) -> Result<(), ShippingError> {
        if order.status != OrderStatus::Pending {
            return Ok(());
        }
        self.store.set_order_status(&order.id, OrderStatus::ReadyToShip).await
    }
}

/// A unit whose label was bought by an earlier attempt. One left unpriced
/// still blocks the batch.
fn earlier_unit(item: &OrderLineItem, line_index: usize, unit: u32, record: CarrierShipmentRecord) -> UnitResult {
    let outcome = match record.amount {
        Some(_) => Ok(record),
        None => Err(ShippingError::LabelUnpriced(record.carrier_shipment_id)),
    };
    UnitResult {
        line_item: item.id.clone(),
        line_index,
        unit,
        already_purchased: true,
        outcome,
    }
}

/// Price of a bought label from the shipment itself: the selected rate, else
/// the quote matching the option.
fn purchased_price(shipment: &Shipment, option: &ShippingOption) -> Result<Option<(i64, String)>, ShippingError> {
    let key = match_key(&option.name, option.carrier.as_deref().unwrap_or_default());
    let rate = shipment
        .selected_rate
        .as_ref()
        .or_else(|| shipment.rates.iter().find(|r| r.match_key() == key));

    match rate {
        Some(rate) => {
            let amount = to_minor_units(&rate.rate, decimal_places_for(&rate.currency))?;
            Ok(Some((amount, rate.currency.clone())))
        }
        None => Ok(None),
    }
}

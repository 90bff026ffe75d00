//! Orders and purchased shipments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::ShippingAddress;
use crate::ids::{
    CarrierShipmentRecordId, OrderId, OrderLineItemId, ReplacementId, ShippingOptionId, ShippingProfileId, ShopId,
};
use crate::money::Currency;

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Paid, labels not yet bought.
    #[default]
    Pending,
    /// Every label bought.
    ReadyToShip,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::ReadyToShip => "ready_to_ship",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::ReadyToShip => "Ready to ship",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Anything a label can be bought for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Shippable {
    OrderProduct(OrderLineItemId),
    Replacement(ReplacementId),
}

impl Shippable {
    pub fn id(&self) -> &str {
        match self {
            Shippable::OrderProduct(id) => id.as_str(),
            Shippable::Replacement(id) => id.as_str(),
        }
    }
}

/// One line of an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineItem {
    pub id: OrderLineItemId,
    /// Owner of the labels bought for this line.
    pub shippable: Shippable,
    /// Product name at time of order.
    pub name: String,
    /// Each unit ships as its own package.
    pub quantity: u32,
    /// False for digital goods and services.
    pub requires_shipping: bool,
    /// Profile chosen for this line, overriding the product's.
    pub shipping_profile_id: Option<ShippingProfileId>,
    /// The product's own profile.
    pub product_profile_id: Option<ShippingProfileId>,
    /// Option the buyer picked at checkout.
    pub shipping_option_id: Option<ShippingOptionId>,
}

impl OrderLineItem {
    /// A physical product line.
    pub fn product(name: impl Into<String>, quantity: u32) -> Self {
        let id = OrderLineItemId::generate();
        Self {
            shippable: Shippable::OrderProduct(id.clone()),
            id,
            name: name.into(),
            quantity,
            requires_shipping: true,
            shipping_profile_id: None,
            product_profile_id: None,
            shipping_option_id: None,
        }
    }

    pub fn with_profile(mut self, profile: ShippingProfileId) -> Self {
        self.product_profile_id = Some(profile);
        self
    }

    pub fn with_option(mut self, option: ShippingOptionId) -> Self {
        self.shipping_option_id = Some(option);
        self
    }

    /// Line override, else the product's profile.
    pub fn effective_profile_id(&self) -> Option<&ShippingProfileId> {
        self.shipping_profile_id
            .as_ref()
            .or(self.product_profile_id.as_ref())
    }
}

/// An order awaiting fulfilment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub shop_id: ShopId,
    pub status: OrderStatus,
    /// The buyer's currency; labels are quoted in it.
    pub currency: Currency,
    pub delivery_address: ShippingAddress,
    pub line_items: Vec<OrderLineItem>,
}

impl Order {
    pub fn new(shop_id: ShopId, currency: Currency, delivery_address: ShippingAddress) -> Self {
        Self {
            id: OrderId::generate(),
            shop_id,
            status: OrderStatus::Pending,
            currency,
            delivery_address,
            line_items: Vec::new(),
        }
    }

    pub fn with_line_item(mut self, item: OrderLineItem) -> Self {
        self.line_items.push(item);
        self
    }

    /// Lines that need a label.
    pub fn shippable_items(&self) -> impl Iterator<Item = &OrderLineItem> {
        self.line_items.iter().filter(|item| item.requires_shipping)
    }

    /// Packages the order ships as.
    pub fn package_count(&self) -> u32 {
        self.shippable_items().map(|item| item.quantity).sum()
    }
}

/// A purchased label. Never edited once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarrierShipmentRecord {
    pub id: CarrierShipmentRecordId,
    pub shippable: Shippable,
    pub shipping_option_id: ShippingOptionId,
    pub carrier_shipment_id: String,
    pub postage_label_url: String,
    pub tracking_code: Option<String>,
    #[serde(default)]
    pub tracking_details: Option<serde_json::Value>,
    /// What the label cost, in minor units; None when it could not be
    /// determined.
    pub amount: Option<i64>,
    pub currency: String,
    /// Id of the merchant charge that billed this label; None until billed.
    #[serde(default)]
    pub charge_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CarrierShipmentRecord {
    pub fn is_charged(&self) -> bool {
        self.charge_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress::new("Jane Smith", "456 Oak Ave", "Los Angeles", "CA", "90001", "US")
    }

    #[test]
    fn test_effective_profile_prefers_override() {
        let mut item = OrderLineItem::product("Mug", 1).with_profile(ShippingProfileId::new("product"));
        assert_eq!(item.effective_profile_id().map(|p| p.as_str()), Some("product"));
        item.shipping_profile_id = Some(ShippingProfileId::new("override"));
        assert_eq!(item.effective_profile_id().map(|p| p.as_str()), Some("override"));
    }

    #[test]
    fn test_package_count_skips_digital_lines() {
        let mut gift_card = OrderLineItem::product("Gift card", 1);
        gift_card.requires_shipping = false;
        let order = Order::new(ShopId::new("s"), Currency::USD, address())
            .with_line_item(OrderLineItem::product("Mug", 3))
            .with_line_item(gift_card);
        assert_eq!(order.package_count(), 3);
        assert_eq!(order.shippable_items().count(), 1);
    }

    #[test]
    fn test_shippable_serializes_tagged() {
        let shippable = Shippable::Replacement(ReplacementId::new("rep_1"));
        assert_eq!(
            serde_json::to_value(&shippable).unwrap(),
            serde_json::json!({ "type": "replacement", "id": "rep_1" })
        );
        assert_eq!(shippable.id(), "rep_1");
    }
}

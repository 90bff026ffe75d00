//! Shipping profiles, carrier rates and label purchasing for TurboCommerce.
//!
//! This crate covers the shipping side of a marketplace order:
//!
//! - **Profiles**: Parcel, dispatch and option configuration per product or item
//! - **Rates**: Quotes from a shipment service matched onto configured options
//! - **Purchase**: Concurrent label purchase, order status and merchant billing
//! - **Validation**: Parcel, address and profile checks with per-field messages
//! - **Estimates**: Delivery and dispatch windows for checkout labels
//!
//! External services (shipment rating and labels, address verification,
//! billing) sit behind traits in [`service`]; persistence behind
//! [`store::ShippingStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_shipping::prelude::*;
//!
//! let calculator = RateCalculator::new(service, store, registry, Timeouts::default());
//! let rates = calculator
//!     .calculate(&profile, &shop, &CarrierAddress::postal_code_only("90001"), Currency::USD)
//!     .await?;
//! for rate in rates.quotes() {
//!     println!("{} {} {}", rate.carrier, rate.service, rate.rate);
//! }
//! ```

pub mod address;
pub mod carrier;
pub mod config;
pub mod error;
pub mod estimate;
pub mod ids;
pub mod money;
pub mod order;
pub mod profile;
pub mod profiles;
pub mod purchase;
pub mod rates;
pub mod service;
pub mod store;
pub mod units;
pub mod validation;

pub use error::{ExternalService, ExternalServiceError, ShippingError};
pub use ids::*;
pub use money::{Currency, Money};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ExternalService, ExternalServiceError, ShippingError};
    pub use crate::ids::*;
    pub use crate::money::{Currency, Money};

    // Configuration
    pub use crate::carrier::{Carrier, CarrierRegistry};
    pub use crate::config::{ServiceMode, ShippingConfig, Timeouts};

    // Domain
    pub use crate::address::{CarrierAddress, ShippingAddress};
    pub use crate::order::{CarrierShipmentRecord, Order, OrderLineItem, OrderStatus, Shippable};
    pub use crate::profile::{
        DispatchPeriod, ShippingOption, ShippingOptionRate, ShippingProfile, Shop,
    };

    // Services
    pub use crate::service::{AddressVerifier, BillingGateway, ShipmentService};
    pub use crate::store::{InMemoryStore, ShippingStore};

    // Operations
    pub use crate::estimate::{estimate, DeliveryEstimate};
    pub use crate::profiles::{CustomOptionInput, ProfileManager};
    pub use crate::purchase::{LabelPurchaser, PurchaseResult};
    pub use crate::rates::{RateCalculation, RateCalculator};
    pub use crate::units::{Length, Weight};
    pub use crate::validation::{
        AddressValidator, ParcelInput, ParcelValidator, ProfileInput, ProfileValidator,
        ValidationErrors,
    };
}

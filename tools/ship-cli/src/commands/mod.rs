//! CLI command implementations.

pub mod carriers;
pub mod config;
pub mod convert;
pub mod estimate;
pub mod parcel;

use chrono::NaiveDate;
use clap::{Args, Subcommand};

/// Arguments for the convert command.
#[derive(Args)]
pub struct ConvertArgs {
    /// Value to convert.
    pub value: String,

    /// Unit the value is in (lb, oz, kg, in, cm).
    pub from: String,

    /// Unit to convert to.
    pub to: String,
}

/// Arguments for the validate-parcel command.
#[derive(Args)]
pub struct ParcelArgs {
    /// Parcel weight.
    #[arg(short, long)]
    pub weight: Option<String>,

    /// Weight unit.
    #[arg(long)]
    pub weight_unit: Option<String>,

    /// Parcel length.
    #[arg(short, long)]
    pub length: Option<String>,

    /// Parcel width.
    #[arg(long)]
    pub width: Option<String>,

    /// Parcel height.
    #[arg(long)]
    pub height: Option<String>,

    /// Length unit for the dimensions.
    #[arg(long)]
    pub length_unit: Option<String>,
}

/// Arguments for the estimate command.
#[derive(Args)]
pub struct EstimateArgs {
    /// Dispatch tier index (0: 1-3, 1: 4-6, 2: 7-10, 3: 11+ days). Omit for ready to ship.
    #[arg(short, long)]
    pub dispatch_period: Option<usize>,

    /// Carrier transit days, when known.
    #[arg(long)]
    pub delivery_days: Option<u32>,

    /// Date to count from (YYYY-MM-DD, default: today).
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Carrier key, to print a checkout label.
    #[arg(long, requires_all = ["service", "price"])]
    pub carrier: Option<String>,

    /// Carrier service name.
    #[arg(long)]
    pub service: Option<String>,

    /// Price in major units, e.g. 10.50.
    #[arg(long)]
    pub price: Option<String>,

    /// Currency of the price.
    #[arg(long, default_value = "USD")]
    pub currency: String,
}

/// Arguments for the carriers command.
#[derive(Args)]
pub struct CarriersArgs {
    /// Only carriers shipping from this country.
    #[arg(short, long)]
    pub origin: Option<String>,

    /// List each carrier's services.
    #[arg(short, long)]
    pub services: bool,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Write a default config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

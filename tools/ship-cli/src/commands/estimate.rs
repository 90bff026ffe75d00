//! Delivery estimate command.

use anyhow::{anyhow, Context as _, Result};
use chrono::Local;
use turbo_shipping::estimate::{estimate, option_label};
use turbo_shipping::money::{Currency, Money};
use turbo_shipping::profile::DispatchPeriod;

use super::EstimateArgs;
use crate::context::Context;

/// Run the estimate command.
pub async fn run(args: EstimateArgs, ctx: &Context) -> Result<()> {
    let period = args
        .dispatch_period
        .map(|index| {
            DispatchPeriod::from_index(index).ok_or_else(|| anyhow!("Dispatch period {} is out of range (0-3)", index))
        })
        .transpose()?;
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let est = estimate(period, args.delivery_days, today);

    let label = match (&args.carrier, &args.service, &args.price) {
        (Some(carrier), Some(service), Some(price)) => {
            let currency = Currency::from_code(&args.currency)
                .ok_or_else(|| anyhow!("Unsupported currency {}", args.currency))?;
            let price = Money::parse_decimal(price, currency)
                .with_context(|| format!("Invalid price {}", price))?;
            let registry = ctx.config.carrier_registry();
            Some(option_label(&registry, carrier, service, price, &est))
        }
        _ => None,
    };

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "estimate": est,
            "text": est.to_string(),
            "label": label,
        }));
        return Ok(());
    }

    match label {
        Some(label) => println!("{}", label),
        None => println!("{}", est),
    }
    if let Some(period) = period {
        ctx.output.kv("handling", &period.to_string());
    }
    Ok(())
}

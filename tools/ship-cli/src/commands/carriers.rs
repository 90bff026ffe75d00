//! Carrier listing command.

use anyhow::Result;

use super::CarriersArgs;
use crate::context::Context;
use crate::output::enabled_badge;

/// Run the carriers command.
pub async fn run(args: CarriersArgs, ctx: &Context) -> Result<()> {
    let registry = ctx.config.carrier_registry();

    let carriers: Vec<_> = registry
        .iter()
        .filter(|(_, carrier)| match &args.origin {
            Some(origin) => carrier.enabled && carrier.ships_from(origin),
            None => true,
        })
        .collect();

    if ctx.output.is_json() {
        let map: serde_json::Map<String, serde_json::Value> = carriers
            .iter()
            .map(|(key, carrier)| Ok((key.to_string(), serde_json::to_value(carrier)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        ctx.output.json(&map);
        return Ok(());
    }

    match &args.origin {
        Some(origin) => ctx.output.header(&format!("Carriers shipping from {}", origin.to_uppercase())),
        None => ctx.output.header("Carriers"),
    }

    if carriers.is_empty() {
        ctx.output.info("No carriers found");
        return Ok(());
    }

    let widths = [12, 14, 12, 10];
    ctx.output.table_row(&["KEY", "NAME", "ORIGINS", "STATUS"], &widths);
    for &(key, carrier) in &carriers {
        let origins = carrier.supported_origins.join(",");
        let badge = enabled_badge(carrier.enabled);
        ctx.output.table_row(&[key, carrier.name.as_str(), origins.as_str(), badge.as_str()], &widths);

        if args.services {
            for service in &carrier.services {
                ctx.output.list_item(service);
            }
        }
    }

    Ok(())
}

//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};
use turbo_shipping::config::ShippingConfig;

use super::{ConfigArgs, ConfigCommand};
use crate::context::{Context, CONFIG_NAMES};

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force } => init_config(force, ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults)"),
    }

    let config = &ctx.config;
    ctx.output.kv("mode", config.mode.as_str());
    ctx.output.kv("weight_units", &config.weight_units.join(", "));
    ctx.output.kv("length_units", &config.length_units.join(", "));

    ctx.output.info("");
    ctx.output.info("[supported_countries]");
    for (code, name) in &config.supported_countries {
        ctx.output.kv(code, name);
    }

    ctx.output.info("");
    ctx.output.info("[timeouts]");
    ctx.output.kv("shipment_ms", &config.timeouts.shipment_ms.to_string());
    ctx.output.kv("address_ms", &config.timeouts.address_ms.to_string());
    ctx.output.kv("billing_ms", &config.timeouts.billing_ms.to_string());

    ctx.output.info("");
    ctx.output.info("[purchase]");
    ctx.output.kv("concurrency", &config.purchase.concurrency.to_string());

    if config.carriers.is_some() {
        ctx.output.info("");
        ctx.output.info("Custom carrier table:");
        for (key, _) in config.carrier_registry().iter() {
            ctx.output.list_item(key);
        }
    }

    Ok(())
}

async fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(CONFIG_NAMES[0]);

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let content = ShippingConfig::default().to_toml()?;
    fs::write(&config_path, format!("# Shipping configuration\n\n{}", content))
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

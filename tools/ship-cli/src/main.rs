//! Ship CLI - Command line tool for TurboCommerce shipping.
//!
//! Commands:
//! - `ship convert` - Convert a weight or length between units
//! - `ship validate-parcel` - Check parcel fields against the profile rules
//! - `ship estimate` - Compute a delivery or dispatch estimate
//! - `ship carriers` - List carriers and their services
//! - `ship config` - Manage configuration

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CarriersArgs, ConfigArgs, ConvertArgs, EstimateArgs, ParcelArgs};

/// Ship CLI - Inspect shipping configuration, units and estimates
#[derive(Parser)]
#[command(name = "ship")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a weight or length between units
    Convert(ConvertArgs),

    /// Validate parcel weight and dimensions
    ValidateParcel(ParcelArgs),

    /// Estimate arrival or dispatch dates
    Estimate(EstimateArgs),

    /// List configured carriers
    Carriers(CarriersArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    let result = match cli.command {
        Commands::Convert(args) => commands::convert::run(args, &ctx).await,
        Commands::ValidateParcel(args) => commands::parcel::run(args, &ctx).await,
        Commands::Estimate(args) => commands::estimate::run(args, &ctx).await,
        Commands::Carriers(args) => commands::carriers::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use turbo_shipping::config::ShippingConfig;

use crate::output::Output;

/// Config file names searched for, nearest directory first.
pub const CONFIG_NAMES: [&str; 3] = ["shipping.toml", ".shipping.toml", "shipping.json"];

/// Execution context for CLI commands.
pub struct Context {
    pub config: ShippingConfig,
    /// Where the config came from; None when running on defaults.
    pub config_path: Option<PathBuf>,
    pub output: Output,
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => {
                let config = ShippingConfig::load(path)
                    .with_context(|| format!("Failed to load config file: {}", path))?;
                (config, Some(PathBuf::from(path)))
            }
            None => match Self::find_config(&cwd) {
                Some((config, path)) => (config, Some(path)),
                None => (ShippingConfig::default(), None),
            },
        };

        if let Some(path) = &config_path {
            output.debug(&format!("Using config {}", path.display()));
        }

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(ShippingConfig, PathBuf)> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let path = current.join(name);
                if path.exists() {
                    match ShippingConfig::load(&path) {
                        Ok(config) => return Some((config, path)),
                        Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }
}

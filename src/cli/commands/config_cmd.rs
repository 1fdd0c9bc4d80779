//! config command - Inspect the effective configuration

use crate::cli::Context;
use crate::core::config::{Config, GlobalConfig, TaskSettings};
use anyhow::{Context as _, Result};

/// Global configuration with every default filled in.
fn effective(config: &Config) -> GlobalConfig {
    GlobalConfig {
        root: config.root().map(|p| p.to_path_buf()),
        bind: Some(config.bind().to_string()),
        port: Some(config.port()),
        tasks: Some(TaskSettings {
            wait_ms: Some(config.task_wait().as_millis() as u64),
            retention_secs: Some(config.task_retention().as_secs()),
            max_workers: Some(config.max_workers()),
        }),
        identity: config.global.identity.clone(),
    }
}

/// Print the effective configuration as TOML.
pub fn show(ctx: &Context) -> Result<()> {
    let config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;
    let rendered = toml::to_string_pretty(&effective(&config)).context("Failed to render config")?;
    print!("{rendered}");
    Ok(())
}

/// Print where the global configuration was loaded from.
pub fn path(ctx: &Context) -> Result<()> {
    let config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;
    match config.global_config_loaded_from() {
        Some(path) => println!("{}", path.display()),
        None => {
            let canonical = Config::global_config_path()?;
            println!("(none; defaults in use, write {} to configure)", canonical.display());
        }
    }
    Ok(())
}

//! serve command - Run the HTTP gateway

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::cli::Context;
use crate::core::config::Config;
use crate::engine::Gateway;
use crate::server::{self, ServeConfig};

/// Start the server. Flags override the loaded configuration.
pub fn serve(ctx: &Context, root: Option<PathBuf>, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load(ctx.config.as_deref()).context("Failed to load config")?;
    if let Some(root) = root {
        config.global.root = Some(root);
    }
    if let Some(bind) = bind {
        config.global.bind = Some(bind);
    }
    if let Some(port) = port {
        if port == 0 {
            bail!("--port must not be 0");
        }
        config.global.port = Some(port);
    }

    let Some(root) = config.root() else {
        bail!("No repository root configured. Pass --root or set `root` in the config file.");
    };
    if !root.is_dir() {
        bail!("Repository root '{}' is not a directory", root.display());
    }
    let root = root
        .canonicalize()
        .with_context(|| format!("Failed to resolve '{}'", root.display()))?;

    let serve_config = ServeConfig {
        bind: config.bind().to_string(),
        port: config.port(),
    };
    let gateway = Arc::new(Gateway::new(root, config));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::serve(gateway, serve_config))
}

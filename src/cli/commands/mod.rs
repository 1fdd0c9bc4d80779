//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads the configuration named by the global flags
//! 2. Applies its own flags on top
//! 3. Runs, printing results to stdout
//!
//! `serve` is the only async command; it builds its own tokio runtime.

mod completion;
mod config_cmd;
mod serve;

pub use completion::completion;
pub use config_cmd::{path, show};
pub use serve::serve;

use super::args::{Command, ConfigAction};
use super::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Serve { root, bind, port } => serve(ctx, root, bind, port),
        Command::Config { action } => match action {
            ConfigAction::Show => show(ctx),
            ConfigAction::Path => path(ctx),
        },
        Command::Completion { shell } => completion(shell),
    }
}

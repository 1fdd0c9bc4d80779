//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <file>`: Read the global configuration from this file
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Only log warnings and errors

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitgate - REST gateway for git repositories
#[derive(Parser, Debug)]
#[command(name = "gitgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read the global configuration from this file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the repositories below a directory over HTTP
    #[command(
        name = "serve",
        long_about = "Serve the repositories below a directory over HTTP.\n\n\
            Every directory directly below the root that holds a non-bare git \
            repository is served under /gitapi/.../file/<name>/. Clone, fetch and \
            push run as tasks that can be polled at /task/id/<id>.\n\n\
            Flags override the configuration file.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Serve ~/repos on the default address (127.0.0.1:8080)
    gitgate serve --root ~/repos

    # Listen on all interfaces with request logging
    gitgate --debug serve --root /srv/git --bind 0.0.0.0 --port 9000

    # Check the status of a served repository
    curl http://127.0.0.1:8080/gitapi/status/file/demo/"
    )]
    Serve {
        /// Directory holding the served repositories
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Address to bind the listener to
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// Port to listen on
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Inspect the configuration
    #[command(
        name = "config",
        long_about = "Inspect the gitgate configuration.\n\n\
            The global configuration is read from --config, $GITGATE_CONFIG, \
            $XDG_CONFIG_HOME/gitgate/config.toml or ~/.gitgate/config.toml, \
            whichever is found first.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Print the effective configuration, defaults included
    gitgate config show

    # Where was the configuration loaded from?
    gitgate config path"
    )]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for gitgate.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    gitgate completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    gitgate completion zsh >> ~/.zshrc

    # Fish
    gitgate completion fish > ~/.config/fish/completions/gitgate.fish

    # PowerShell
    gitgate completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print where the global configuration was loaded from
    Path,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

//! Command-line argument definitions
// (c) 2026 OpenNetty contributors

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Manual exercise of the OpenNetty service façade against a configuration
/// file: send one-off commands, watch raw or classified events, or drive a
/// configured endpoint through the controller.
#[derive(Debug, Parser)]
#[command(name = "opennettyctl", version, about)]
pub struct CliArgs {
    /// path to the TOML configuration document
    #[arg(long, short = 'c', default_value = "opennetty.toml")]
    pub config: PathBuf,

    /// enable debug-level logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Switch an endpoint on.
    SwitchOn {
        /// endpoint name, as declared in the configuration document
        endpoint: String,
    },
    /// Switch an endpoint off.
    SwitchOff {
        /// endpoint name
        endpoint: String,
    },
    /// Set an endpoint's brightness (0..=100, quantized per dialect).
    SetBrightness {
        /// endpoint name
        endpoint: String,
        /// requested brightness percentage
        level: u8,
    },
    /// Print classified events as they arrive.
    Observe {
        /// how long to observe before exiting, in seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
}

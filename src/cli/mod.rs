//! `opennettyctl` command-line interface
// (c) 2026 OpenNetty contributors

mod args;
mod cli_main;

pub use cli_main::cli;

//! CLI module for clusterscope - command-line interface and subcommands.
//!
//! One subcommand per monitor operation, plus `serve` for the HTTP API.

pub mod commands;

pub use commands::Cli;

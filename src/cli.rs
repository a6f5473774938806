//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Foundry resource compilation server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: foundry.toml)
    #[arg(short = 'C', long, default_value = "foundry.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the resource compilation server until Ctrl+C
    #[command(visible_alias = "s")]
    Serve {
        /// Port number to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Package maps and their runtime dependencies, then exit
    #[command(visible_alias = "p")]
    Package {
        /// Map resources to package (e.g. data://maps/arena.map).
        /// If omitted, every map found under the raw resource root is packaged.
        #[arg(value_name = "RESOURCE")]
        maps: Vec<String>,
    },
}

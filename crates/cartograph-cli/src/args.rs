//! Command-line argument definitions for the Cartograph CLI.

use clap::Parser;

/// Command-line arguments for the Cartograph world compiler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input world file
    #[arg(help = "Path to the input file")]
    pub input: String,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the bill of materials of the built world to stdout
    #[arg(long)]
    pub bom: bool,
}

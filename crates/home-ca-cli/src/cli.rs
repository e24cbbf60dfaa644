//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Issue a private CA and server certificates for a home network.
#[derive(Parser, Debug, Clone)]
#[command(name = "home-ca")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(
        short = 'f',
        long,
        env = "HOME_CA_CONFIG",
        default_value = "config.yaml"
    )]
    pub config_file: PathBuf,

    /// Directory to write keys and certificates to.
    ///
    /// Overrides `output_directory` from the configuration file.
    #[arg(short, long)]
    pub output_directory: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Table)]
    pub format: Format,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[derive(Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

//! # home-ca-cli
//!
//! Command-line front end for the `home-ca` crate.
//!
//! Reads a YAML configuration, provisions the root CA and host certificates
//! into the output directory and prints what was created or reused.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Format};
pub use config::Settings;
pub use error::{CliError, ConfigError};
pub use output::OutputFormat;

use std::io::Write;

use tracing::info;

/// Loads the configuration named by `cli`, provisions every artifact and
/// writes the report to `out`.
///
/// # Errors
///
/// Returns the first configuration, filesystem, PKI or output error.
pub fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<(), CliError> {
    let settings = Settings::from_file(&cli.config_file)?;
    let request = settings.into_request(cli.output_directory.clone());

    std::fs::DirBuilder::new()
        .recursive(true)
        .create(&request.output_dir)
        .map_err(|source| CliError::CreateDir {
            path: request.output_dir.clone(),
            source,
        })?;

    info!(
        config = %cli.config_file.display(),
        output_dir = %request.output_dir.display(),
        hosts = request.hosts.len(),
        "provisioning certificates"
    );

    let report = home_ca::provision(&request)?;
    OutputFormat::new(cli.format).write(out, &report)
}

//! YAML configuration.
//!
//! The file is parsed into a loose document first and then validated in one
//! pass, so every missing or invalid field is reported together.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use home_ca::{Host, NameTemplate, ProvisionRequest};
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

/// Output directory used when neither the file nor `-o` names one.
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "certificates";

/// Domain appended to host names when the file does not set one.
pub const DEFAULT_DOMAIN: &str = "local";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    output_directory: Option<PathBuf>,
    domain: Option<String>,
    name: Option<RawName>,
    hosts: Option<Vec<RawHost>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawName {
    country: Option<String>,
    state: Option<String>,
    locality: Option<String>,
    organization: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHost {
    names: Option<Vec<String>>,
    ip_addresses: Option<Vec<String>>,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Where artifacts are written.
    pub output_directory: PathBuf,
    /// Suffix appended to every host name.
    pub domain: String,
    /// Distinguished-name attributes shared by all certificates.
    pub name: NameTemplate,
    /// Hosts to issue certificates for, in file order.
    pub hosts: Vec<Host>,
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// A file that does not exist is treated as an empty document, which
    /// then fails validation with the list of required fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using empty document");
                String::new()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::from_yaml(&content, path)
    }

    /// Parse settings from a YAML string; `path` is only used in errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or fails validation.
    pub fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str::<Option<RawConfig>>(content)
                .map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
                .unwrap_or_default()
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut problems = Vec::new();

        let name = match raw.name {
            Some(name) => validate_name(name, &mut problems),
            None => {
                problems.push("name is required".to_string());
                None
            }
        };

        let hosts = match raw.hosts {
            Some(hosts) if hosts.is_empty() => {
                problems.push("hosts must not be empty".to_string());
                Vec::new()
            }
            Some(hosts) => hosts
                .into_iter()
                .enumerate()
                .filter_map(|(i, host)| validate_host(i, host, &mut problems))
                .collect(),
            None => {
                problems.push("hosts is required".to_string());
                Vec::new()
            }
        };

        match name {
            Some(name) if problems.is_empty() => Ok(Self {
                output_directory: raw
                    .output_directory
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)),
                domain: raw.domain.unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
                name,
                hosts,
            }),
            _ => Err(ConfigError::Invalid(problems)),
        }
    }

    /// Build a provisioning request, with `output_directory` replacing the
    /// configured directory when given.
    #[must_use]
    pub fn into_request(self, output_directory: Option<PathBuf>) -> ProvisionRequest {
        ProvisionRequest {
            output_dir: output_directory.unwrap_or(self.output_directory),
            names: self.name,
            domain: self.domain,
            hosts: self.hosts,
        }
    }
}

fn required(field: &str, value: Option<String>, problems: &mut Vec<String>) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            problems.push(format!("{field} is required"));
            None
        }
    }
}

fn validate_name(raw: RawName, problems: &mut Vec<String>) -> Option<NameTemplate> {
    let country = required("name.country", raw.country, problems);
    let state = required("name.state", raw.state, problems);
    let locality = required("name.locality", raw.locality, problems);
    let organization = required("name.organization", raw.organization, problems);

    let country = country.filter(|c| {
        let valid = c.len() == 2 && c.chars().all(|ch| ch.is_ascii_alphabetic());
        if !valid {
            problems.push(format!("name.country '{c}' must be a two-letter code"));
        }
        valid
    });

    Some(NameTemplate {
        country: country?,
        state: state?,
        locality: locality?,
        organization: organization?,
    })
}

fn validate_host(index: usize, raw: RawHost, problems: &mut Vec<String>) -> Option<Host> {
    let before = problems.len();

    let names = raw.names.unwrap_or_default();
    if names.is_empty() {
        problems.push(format!("hosts[{index}].names is required"));
    }
    for (j, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            problems.push(format!("hosts[{index}].names[{j}] must not be empty"));
        }
    }

    let mut ip_addresses = Vec::new();
    for (j, value) in raw.ip_addresses.unwrap_or_default().iter().enumerate() {
        match value.trim().parse::<IpAddr>() {
            Ok(ip) => ip_addresses.push(ip),
            Err(_) => problems.push(format!(
                "hosts[{index}].ip_addresses[{j}] '{value}' is not an IP address"
            )),
        }
    }

    (problems.len() == before).then(|| Host {
        names: names.into_iter().map(|n| n.trim().to_string()).collect(),
        ip_addresses,
    })
}

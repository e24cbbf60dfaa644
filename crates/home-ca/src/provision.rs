//! End-to-end provisioning of a root CA and per-host certificates.
//!
//! Runs strictly in order: root key, root certificate, then for each host
//! its key, leaf certificate and chain file. The first error aborts the run.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ca::CertificateAuthority;
use crate::chain::write_chain_if_absent;
use crate::error::{Error, Result};
use crate::issuer::CertificateIssuer;
use crate::keystore;
use crate::types::{NameTemplate, SubjectAltName};

/// Root key file name.
pub const CA_KEY_FILE: &str = "ca.key.pem";

/// Root certificate file name.
pub const CA_CERT_FILE: &str = "ca.cert.pem";

/// A host to issue a server certificate for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Bare host names; the first is the primary name.
    pub names: Vec<String>,
    /// Addresses added to the certificate as IP SANs.
    #[serde(default)]
    pub ip_addresses: Vec<IpAddr>,
}

impl Host {
    /// Creates a host with the given names and no addresses.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            ip_addresses: Vec::new(),
        }
    }

    /// Adds an IP address.
    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip_addresses.push(ip);
        self
    }

    /// The primary (first) name, used for artifact file names.
    #[must_use]
    pub fn primary_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Domain-qualified names followed by IP addresses, in configured order.
    #[must_use]
    pub fn subject_alt_names(&self, domain: &str) -> Vec<SubjectAltName> {
        self.names
            .iter()
            .map(|name| SubjectAltName::Dns(qualify(name, domain)))
            .chain(self.ip_addresses.iter().copied().map(SubjectAltName::from))
            .collect()
    }
}

fn qualify(name: &str, domain: &str) -> String {
    if domain.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{domain}")
    }
}

/// Everything a provisioning run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionRequest {
    /// Directory all artifacts are written to; must already exist.
    pub output_dir: PathBuf,
    /// Shared distinguished-name attributes.
    pub names: NameTemplate,
    /// Suffix appended to every host name.
    pub domain: String,
    /// Hosts, processed in order.
    pub hosts: Vec<Host>,
}

impl ProvisionRequest {
    /// Checks the preconditions the core has no defaults for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfiguration`] for an empty organization,
    /// host list or host name list, and [`Error::InvalidInput`] for a
    /// primary name that cannot be used as a file name.
    pub fn validate(&self) -> Result<()> {
        if self.names.organization.trim().is_empty() {
            return Err(Error::MissingConfiguration("organization name is empty".into()));
        }
        if self.hosts.is_empty() {
            return Err(Error::MissingConfiguration("no hosts defined".into()));
        }
        for (index, host) in self.hosts.iter().enumerate() {
            let Some(primary) = host.primary_name() else {
                return Err(Error::MissingConfiguration(format!(
                    "host #{index} has no names"
                )));
            };
            if !is_safe_file_stem(primary) {
                return Err(Error::InvalidInput(format!(
                    "host name '{primary}' cannot be used as a file name"
                )));
            }
        }
        Ok(())
    }
}

fn is_safe_file_stem(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// RSA private key.
    Key,
    /// X.509 certificate.
    Certificate,
    /// Root + leaf certificate chain.
    Chain,
}

/// Whether an artifact was produced by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    /// Written by this run.
    Created,
    /// Already present and reused.
    Existing,
}

/// One file touched by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Artifact path.
    pub path: PathBuf,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Created or reused.
    pub status: ArtifactStatus,
}

/// Outcome of a provisioning run, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Every artifact the run produced or reused.
    pub artifacts: Vec<Artifact>,
}

impl Report {
    /// Number of artifacts written by this run.
    #[must_use]
    pub fn created(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| a.status == ArtifactStatus::Created)
            .count()
    }

    fn record(&mut self, path: PathBuf, kind: ArtifactKind, existed: bool) {
        let status = if existed {
            ArtifactStatus::Existing
        } else {
            ArtifactStatus::Created
        };
        self.artifacts.push(Artifact { path, kind, status });
    }
}

/// Produces the root CA and every host's key, certificate and chain.
///
/// # Errors
///
/// Returns the first error encountered; artifacts written before it stay on
/// disk and are reused by the next run.
pub fn provision(request: &ProvisionRequest) -> Result<Report> {
    request.validate()?;

    let dir = request.output_dir.as_path();
    let mut report = Report::default();

    let key_path = dir.join(CA_KEY_FILE);
    let existed = key_path.exists();
    let root_key = keystore::generate_or_load(&key_path)?;
    report.record(key_path, ArtifactKind::Key, existed);

    let cert_path = dir.join(CA_CERT_FILE);
    let existed = cert_path.exists();
    let authority = CertificateAuthority::generate_or_load(&cert_path, root_key, &request.names)?;
    report.record(cert_path, ArtifactKind::Certificate, existed);

    let issuer = CertificateIssuer::new(&authority, &request.names);

    for host in &request.hosts {
        provision_host(&issuer, dir, &request.domain, host, &mut report)?;
    }

    info!(
        output_dir = %dir.display(),
        hosts = request.hosts.len(),
        created = report.created(),
        "provisioning complete"
    );

    Ok(report)
}

fn provision_host(
    issuer: &CertificateIssuer<'_>,
    dir: &Path,
    domain: &str,
    host: &Host,
    report: &mut Report,
) -> Result<()> {
    let name = host
        .primary_name()
        .ok_or_else(|| Error::MissingConfiguration("host has no names".into()))?;

    let key_path = dir.join(format!("{name}.key.pem"));
    let existed = key_path.exists();
    let host_key = keystore::generate_or_load(&key_path)?;
    report.record(key_path, ArtifactKind::Key, existed);

    let cert_path = dir.join(format!("{name}.cert.pem"));
    let existed = cert_path.exists();
    let leaf = issuer.generate_or_load(&cert_path, &host_key, &host.subject_alt_names(domain))?;
    report.record(cert_path, ArtifactKind::Certificate, existed);

    let chain_path = dir.join(format!("{name}.chain.pem"));
    let written = write_chain_if_absent(&chain_path, issuer.authority().root_certificate(), &leaf)?;
    report.record(chain_path, ArtifactKind::Chain, !written);

    Ok(())
}

//! Leaf (server) certificate issuance.

use std::net::IpAddr;
use std::path::Path;

use rcgen::{CertificateParams, Ia5String, IsCa, KeyPair, SanType};
use tracing::{debug, info};

use crate::ca::{CertificateAuthority, random_serial, validity_window};
use crate::error::{Error, Result};
use crate::persist::{FileMode, write_new};
use crate::types::{Certificate, NameTemplate, PrivateKey, SubjectAltName};

/// Leaf certificate lifetime: the maximum accepted for publicly trusted
/// server certificates.
pub const SERVER_VALIDITY_DAYS: i64 = 398;

/// Issues leaf certificates signed by a root authority.
///
/// The rcgen signer is only built when a leaf actually has to be issued, so
/// runs that merely load existing leaves never touch the root key.
#[derive(Debug)]
pub struct CertificateIssuer<'a> {
    authority: &'a CertificateAuthority,
    names: &'a NameTemplate,
}

impl<'a> CertificateIssuer<'a> {
    /// Prepares an issuer for `authority`; leaf subjects use `names` with
    /// the leaf's primary DNS name as common name.
    #[must_use]
    pub const fn new(authority: &'a CertificateAuthority, names: &'a NameTemplate) -> Self {
        Self { authority, names }
    }

    /// Returns the authority this issuer signs for.
    #[must_use]
    pub const fn authority(&self) -> &CertificateAuthority {
        self.authority
    }

    /// Loads the leaf certificate stored at `path`, or issues, persists and
    /// returns a new one for `host_key` covering `sans`.
    ///
    /// `sans[0]` must be a DNS name; it becomes the subject common name.
    /// A stored certificate is returned unchanged, even if it no longer
    /// matches `sans` or the current root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] (without writing anything) if a new
    /// leaf is needed and `sans` is empty or starts with an IP address,
    /// [`Error::Parse`] for a malformed stored certificate,
    /// [`Error::Validation`] if the signed leaf would not name the root's
    /// exact subject as its issuer, and signing or filesystem errors.
    pub fn generate_or_load(
        &self,
        path: &Path,
        host_key: &PrivateKey,
        sans: &[SubjectAltName],
    ) -> Result<Certificate> {
        if path.exists() {
            debug!(path = %path.display(), "loading existing server certificate");
            let pem = std::fs::read(path).map_err(|e| Error::io(path, e))?;
            return Certificate::from_pem(&pem);
        }

        let common_name = primary_dns_name(sans)?;

        info!(
            path = %path.display(),
            subject = %common_name,
            san_count = sans.len(),
            "issuing server certificate"
        );

        let mut params = CertificateParams::default();
        params.distinguished_name = self.names.name(common_name).to_distinguished_name()?;
        params.is_ca = IsCa::NoCa;
        params.subject_alt_names = convert_sans(sans)?;
        params.serial_number = Some(random_serial());

        let (not_before, not_after) = validity_window(SERVER_VALIDITY_DAYS)?;
        params.not_before = not_before;
        params.not_after = not_after;

        let (signer, signing_key) = self.signer()?;
        let host_key_pair = host_key.key_pair()?;
        let cert = params
            .signed_by(&host_key_pair, &signer, &signing_key)
            .map_err(|e| Error::Generation(format!("failed to sign certificate: {e}")))?;

        let certificate = Certificate::from_der(cert.der())?;
        let root = self.authority.root_certificate();
        if certificate.issuer_der() != root.subject_der() {
            return Err(Error::Validation(format!(
                "issuer name of '{common_name}' does not reproduce the subject of '{}'",
                root.subject()
            )));
        }
        write_new(path, certificate.pem().as_bytes(), FileMode::Public)?;

        debug!("Certificate issued successfully for: {}", common_name);

        Ok(certificate)
    }

    /// Re-expresses the root certificate and key for rcgen's signing API.
    fn signer(&self) -> Result<(rcgen::Certificate, KeyPair)> {
        let signing_key = self.authority.root_key().key_pair()?;

        let params =
            CertificateParams::from_ca_cert_der(&self.authority.root_certificate().der().into())
                .map_err(|e| Error::Parse(format!("failed to read root certificate: {e}")))?;
        let signer = params
            .self_signed(&signing_key)
            .map_err(|e| Error::Generation(format!("failed to create issuer cert: {e}")))?;

        Ok((signer, signing_key))
    }
}

/// The leaf common name: the first entry, which must be a DNS name that is
/// not itself an IP literal.
fn primary_dns_name(sans: &[SubjectAltName]) -> Result<&str> {
    match sans.first() {
        None => Err(Error::InvalidInput(
            "at least one subject alternative name is required".into(),
        )),
        Some(SubjectAltName::Dns(name)) if name.parse::<IpAddr>().is_ok() => Err(
            Error::InvalidInput(format!("first name must be a domain name, not IP literal '{name}'")),
        ),
        Some(SubjectAltName::Dns(name)) => Ok(name),
        Some(other) => Err(Error::InvalidInput(format!(
            "first name must be a domain name, not {other}"
        ))),
    }
}

/// Converts `SubjectAltName`s to rcgen `SanType`s, preserving order.
fn convert_sans(sans: &[SubjectAltName]) -> Result<Vec<SanType>> {
    sans.iter()
        .map(|san| match san {
            SubjectAltName::Dns(dns) => {
                let ia5 = Ia5String::try_from(dns.clone())
                    .map_err(|e| Error::InvalidInput(format!("invalid DNS name '{dns}': {e}")))?;
                Ok(SanType::DnsName(ia5))
            }
            SubjectAltName::Ipv4(ip) => Ok(SanType::IpAddress(IpAddr::V4(*ip))),
            SubjectAltName::Ipv6(ip) => Ok(SanType::IpAddress(IpAddr::V6(*ip))),
        })
        .collect()
}

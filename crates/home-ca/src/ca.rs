//! Certificate Authority implementation.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyUsagePurpose, SerialNumber};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::persist::{FileMode, write_new};
use crate::types::{Certificate, NameTemplate, PrivateKey};

/// Root certificate lifetime. Apple platforms refuse CA certificates valid
/// for longer than 825 days.
pub const CA_VALIDITY_DAYS: i64 = 825;

/// Serial numbers are at most 20 octets (RFC 5280 §4.1.2.2).
const SERIAL_LEN: usize = 20;

/// Self-signed root Certificate Authority: the root certificate and its key.
pub struct CertificateAuthority {
    /// Root certificate.
    root_cert: Certificate,
    /// Root private key.
    root_key: PrivateKey,
}

impl CertificateAuthority {
    /// Loads the root certificate stored at `path`, or creates, persists and
    /// returns a new self-signed one for `root_key`.
    ///
    /// A stored certificate is returned unchanged; it is not checked against
    /// `root_key` or for expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored certificate is malformed, if signing
    /// fails, or on filesystem errors.
    pub fn generate_or_load(
        path: &Path,
        root_key: PrivateKey,
        names: &NameTemplate,
    ) -> Result<Self> {
        if path.exists() {
            debug!(path = %path.display(), "loading existing CA certificate");
            let pem = std::fs::read(path).map_err(|e| Error::io(path, e))?;
            let root_cert = Certificate::from_pem(&pem)?;
            return Ok(Self::from_existing(root_cert, root_key));
        }

        let name = names.ca_name();
        info!(path = %path.display(), subject = %name.common_name, "creating root CA certificate");

        let mut params = CertificateParams::default();
        params.distinguished_name = name.to_distinguished_name()?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.serial_number = Some(random_serial());

        let (not_before, not_after) = validity_window(CA_VALIDITY_DAYS)?;
        params.not_before = not_before;
        params.not_after = not_after;

        let key_pair = root_key.key_pair()?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Generation(format!("failed to generate root certificate: {e}")))?;

        let root_cert = Certificate::from_der(cert.der())?;
        write_new(path, root_cert.pem().as_bytes(), FileMode::Public)?;

        debug!("CA root certificate created successfully");

        Ok(Self::from_existing(root_cert, root_key))
    }

    /// Creates a Certificate Authority from an existing certificate and key.
    #[must_use]
    pub const fn from_existing(root_cert: Certificate, root_key: PrivateKey) -> Self {
        Self {
            root_cert,
            root_key,
        }
    }

    /// Returns a reference to the root certificate.
    #[must_use]
    pub const fn root_certificate(&self) -> &Certificate {
        &self.root_cert
    }

    /// Returns a reference to the root private key.
    #[must_use]
    pub const fn root_key(&self) -> &PrivateKey {
        &self.root_key
    }
}

impl std::fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("root_cert", &self.root_cert.subject())
            .field("root_key", &"[REDACTED]")
            .finish()
    }
}

/// Draws a positive serial number from the OS CSPRNG.
pub(crate) fn random_serial() -> SerialNumber {
    SerialNumber::from(random_serial_bytes())
}

fn random_serial_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; SERIAL_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    // Clear the sign bit so the DER INTEGER stays positive within 20 octets.
    bytes[0] &= 0x7f;
    bytes
}

/// Returns `[now, now + days]` truncated to whole seconds.
pub(crate) fn validity_window(days: i64) -> Result<(time::OffsetDateTime, time::OffsetDateTime)> {
    let now = Utc::now();
    Ok((to_rcgen_time(now)?, to_rcgen_time(now + Duration::days(days))?))
}

/// Converts a chrono `DateTime` to rcgen `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Generation(format!("invalid timestamp: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{validate_self_signed, validity_span};
    use x509_parser::oid_registry::{
        OID_PKCS1_SHA256WITHRSA, OID_X509_EXT_SUBJECT_KEY_IDENTIFIER,
    };
    use x509_parser::prelude::*;

    fn template() -> NameTemplate {
        NameTemplate {
            country: "US".into(),
            state: "California".into(),
            locality: "San Francisco".into(),
            organization: "Home".into(),
        }
    }

    fn new_ca(dir: &Path) -> CertificateAuthority {
        let key = PrivateKey::generate().unwrap();
        CertificateAuthority::generate_or_load(&dir.join("ca.cert.pem"), key, &template()).unwrap()
    }

    #[test]
    fn create_new_ca() {
        let dir = tempfile::tempdir().unwrap();
        let ca = new_ca(dir.path());

        assert_eq!(ca.root_certificate().subject(), "Home CA");
        assert_eq!(ca.root_certificate().issuer(), "Home CA");
        assert!(ca.root_certificate().is_self_issued());
        assert!(dir.path().join("ca.cert.pem").exists());
    }

    #[test]
    fn root_is_self_signed_ca() {
        let dir = tempfile::tempdir().unwrap();
        let ca = new_ca(dir.path());

        assert!(ca.root_certificate().is_ca());
        validate_self_signed(ca.root_certificate()).unwrap();
    }

    #[test]
    fn root_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let ca = new_ca(dir.path());
        let (_, parsed) = X509Certificate::from_der(ca.root_certificate().der()).unwrap();

        let bc = parsed.basic_constraints().unwrap().unwrap();
        assert!(bc.critical);
        assert!(bc.value.ca);
        assert_eq!(bc.value.path_len_constraint, None);

        let ku = parsed.key_usage().unwrap().unwrap();
        assert!(ku.critical);
        assert!(ku.value.key_cert_sign());
        assert!(ku.value.crl_sign());
        assert!(ku.value.digital_signature());
        assert!(!ku.value.key_encipherment());
        assert!(!ku.value.data_encipherment());
        assert!(!ku.value.key_agreement());
        assert!(!ku.value.non_repudiation());

        let ski = parsed
            .get_extension_unique(&OID_X509_EXT_SUBJECT_KEY_IDENTIFIER)
            .unwrap()
            .unwrap();
        assert!(!ski.critical);

        assert_eq!(parsed.signature_algorithm.algorithm, OID_PKCS1_SHA256WITHRSA);
    }

    #[test]
    fn root_subject_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let ca = new_ca(dir.path());
        let (_, parsed) = X509Certificate::from_der(ca.root_certificate().der()).unwrap();
        let subject = parsed.subject();

        let country = subject.iter_country().next().and_then(|a| a.as_str().ok());
        let state = subject.iter_state_or_province().next().and_then(|a| a.as_str().ok());
        let locality = subject.iter_locality().next().and_then(|a| a.as_str().ok());
        let org = subject.iter_organization().next().and_then(|a| a.as_str().ok());
        let cn = subject.iter_common_name().next().and_then(|a| a.as_str().ok());
        assert_eq!(country, Some("US"));
        assert_eq!(state, Some("California"));
        assert_eq!(locality, Some("San Francisco"));
        assert_eq!(org, Some("Home"));
        assert_eq!(cn, Some("Home CA"));
    }

    #[test]
    fn root_validity_window() {
        let dir = tempfile::tempdir().unwrap();
        let before = Utc::now();
        let ca = new_ca(dir.path());
        let after = Utc::now();
        let cert = ca.root_certificate();

        assert!(cert.not_before() <= after);
        assert!(cert.not_before() >= before - Duration::seconds(1));
        assert!(after < cert.not_after());
        assert!(validity_span(cert) <= Duration::days(CA_VALIDITY_DAYS));
        assert_eq!(validity_span(cert), Duration::days(CA_VALIDITY_DAYS));
    }

    #[test]
    fn existing_root_is_loaded_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.cert.pem");
        let first = new_ca(dir.path());
        let bytes = std::fs::read(&path).unwrap();

        // A different key does not trigger regeneration.
        let other_key = PrivateKey::generate().unwrap();
        let second = CertificateAuthority::generate_or_load(&path, other_key, &template()).unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert_eq!(second.root_certificate(), first.root_certificate());
        assert_eq!(second.root_certificate().serial(), first.root_certificate().serial());
        assert_eq!(second.root_certificate().pem().as_bytes(), bytes.as_slice());
    }

    #[test]
    fn malformed_root_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.cert.pem");
        std::fs::write(&path, "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n")
            .unwrap();

        let key = PrivateKey::generate().unwrap();
        let result = CertificateAuthority::generate_or_load(&path, key, &template());

        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn serials_are_random_and_positive() {
        let a = random_serial_bytes();
        let b = random_serial_bytes();
        assert_ne!(a, b);
        assert_eq!(a.len(), SERIAL_LEN);
        assert_eq!(a[0] & 0x80, 0);
    }

    #[test]
    fn ca_debug_redacts_key() {
        let dir = tempfile::tempdir().unwrap();
        let ca = new_ca(dir.path());
        let debug = format!("{ca:?}");
        assert!(debug.contains("REDACTED"));
    }
}

//! Certificate validation utilities.

use chrono::{Duration, Utc};
use tracing::debug;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::types::Certificate;

/// Validates a leaf certificate against the root that should have issued it.
///
/// This performs the following checks:
/// - The certificate is within its validity window
/// - The issuer name matches the root's subject name byte for byte
/// - The signature verifies with the root's public key
///
/// # Errors
///
/// Returns [`Error::Validation`] describing the first failed check.
pub fn validate_issued_by(cert: &Certificate, root: &Certificate) -> Result<()> {
    debug!("Validating certificate: {}", cert.subject());

    if !is_valid_now(cert) {
        return Err(Error::Validation(format!(
            "certificate '{}' is outside its validity window",
            cert.subject()
        )));
    }

    if cert.issuer_der() != root.subject_der() {
        return Err(Error::Validation(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            root.subject()
        )));
    }

    verify_signature(cert, root)?;

    debug!("Certificate validated successfully: {}", cert.subject());

    Ok(())
}

/// Validates a certificate chain ordered from end-entity to root.
///
/// # Errors
///
/// Returns an error if the chain is empty, a link fails
/// [`validate_issued_by`], or the last certificate is not self-signed.
pub fn validate_chain(chain: &[Certificate]) -> Result<()> {
    let Some(root) = chain.last() else {
        return Err(Error::Validation("empty certificate chain".into()));
    };

    for pair in chain.windows(2) {
        validate_issued_by(&pair[0], &pair[1])?;
    }

    validate_self_signed(root)
}

/// Validates that a certificate is self-issued and self-signed.
///
/// # Errors
///
/// Returns an error if issuer and subject differ or the signature does not
/// verify with the certificate's own key.
pub fn validate_self_signed(cert: &Certificate) -> Result<()> {
    if !cert.is_self_issued() {
        return Err(Error::Validation(format!(
            "certificate '{}' is not self-signed",
            cert.subject()
        )));
    }

    verify_signature(cert, cert)
}

/// Verifies that `cert` was signed by the key in `issuer`.
///
/// # Errors
///
/// Returns an error if either certificate fails to parse or the signature
/// does not verify.
pub fn verify_signature(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let (_, parsed_cert) = X509Certificate::from_der(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let (_, parsed_issuer) = X509Certificate::from_der(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::Validation(format!(
                "signature verification failed for '{}': {e:?}",
                cert.subject()
            ))
        })
}

/// Checks if a certificate is expired.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    cert.not_after() < Utc::now()
}

/// Checks if a certificate is not yet valid.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    cert.not_before() > Utc::now()
}

/// Checks if a certificate is currently valid (not expired and `not_before` has passed).
#[must_use]
pub fn is_valid_now(cert: &Certificate) -> bool {
    !is_expired(cert) && !is_not_yet_valid(cert)
}

/// Length of the validity window, `not_after - not_before`.
#[must_use]
pub fn validity_span(cert: &Certificate) -> Duration {
    cert.not_after() - cert.not_before()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{CA_VALIDITY_DAYS, CertificateAuthority};
    use crate::issuer::CertificateIssuer;
    use crate::types::{NameTemplate, PrivateKey, SubjectAltName};
    use std::path::Path;

    fn names(org: &str) -> NameTemplate {
        NameTemplate {
            country: "DE".into(),
            state: "Berlin".into(),
            locality: "Berlin".into(),
            organization: org.into(),
        }
    }

    fn ca(dir: &Path, org: &str) -> CertificateAuthority {
        CertificateAuthority::generate_or_load(
            &dir.join(format!("{org}.cert.pem")),
            PrivateKey::generate().unwrap(),
            &names(org),
        )
        .unwrap()
    }

    fn leaf(dir: &Path, ca: &CertificateAuthority, org: &str) -> Certificate {
        let names = names(org);
        CertificateIssuer::new(ca, &names)
            .generate_or_load(
                &dir.join(format!("{org}-leaf.cert.pem")),
                &PrivateKey::generate().unwrap(),
                &[SubjectAltName::dns("host.local")],
            )
            .unwrap()
    }

    #[test]
    fn fresh_root_is_valid_now() {
        let dir = tempfile::tempdir().unwrap();
        let root = ca(dir.path(), "One");
        let cert = root.root_certificate();

        assert!(is_valid_now(cert));
        assert!(!is_expired(cert));
        assert!(!is_not_yet_valid(cert));
        assert_eq!(validity_span(cert), Duration::days(CA_VALIDITY_DAYS));
    }

    #[test]
    fn validate_certificate_with_real_ca() {
        let dir = tempfile::tempdir().unwrap();
        let root = ca(dir.path(), "One");
        let cert = leaf(dir.path(), &root, "One");

        validate_issued_by(&cert, root.root_certificate()).unwrap();
    }

    #[test]
    fn validate_certificate_wrong_issuer() {
        let dir = tempfile::tempdir().unwrap();
        let one = ca(dir.path(), "One");
        let two = ca(dir.path(), "Two");
        let cert = leaf(dir.path(), &one, "One");

        assert!(validate_issued_by(&cert, two.root_certificate()).is_err());
        assert!(verify_signature(&cert, two.root_certificate()).is_err());
    }

    #[test]
    fn leaf_is_not_self_signed() {
        let dir = tempfile::tempdir().unwrap();
        let root = ca(dir.path(), "One");
        let cert = leaf(dir.path(), &root, "One");

        assert!(validate_self_signed(&cert).is_err());
    }

    #[test]
    fn validate_chain_two_certs() {
        let dir = tempfile::tempdir().unwrap();
        let root = ca(dir.path(), "One");
        let cert = leaf(dir.path(), &root, "One");

        validate_chain(&[cert.clone(), root.root_certificate().clone()]).unwrap();
        assert!(validate_chain(&[root.root_certificate().clone(), cert]).is_err());
    }

    #[test]
    fn validate_chain_single_self_signed() {
        let dir = tempfile::tempdir().unwrap();
        let root = ca(dir.path(), "One");

        validate_chain(&[root.root_certificate().clone()]).unwrap();
    }

    #[test]
    fn validate_chain_empty() {
        let result = validate_chain(&[]);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}

//! Private certificate authority for home networks.
#![forbid(unsafe_code)]
//!
//! This crate generates (or reuses) an RSA root CA and issues RSA server
//! certificates for named hosts, writing PEM files that are never
//! overwritten once they exist.
//!
//! # Overview
//!
//! The `home-ca` crate provides:
//! - RSA key generation and loading ([`keystore`])
//! - A self-signed root certificate valid for 825 days ([`ca`])
//! - Server certificates with DNS and IP SANs valid for 398 days ([`issuer`])
//! - Root + leaf chain files ([`chain`])
//! - A single-call run over a list of hosts ([`provision`])
//!
//! # Example
//!
//! ```
//! use home_ca::{provision, Host, NameTemplate, ProvisionRequest};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let request = ProvisionRequest {
//!     output_dir: dir.path().to_path_buf(),
//!     names: NameTemplate {
//!         country: "US".into(),
//!         state: "California".into(),
//!         locality: "San Francisco".into(),
//!         organization: "Home".into(),
//!     },
//!     domain: "home.arpa".into(),
//!     hosts: vec![Host::new(["nas"])],
//! };
//!
//! let report = provision(&request).unwrap();
//! assert_eq!(report.created(), 5);
//! assert!(dir.path().join("nas.chain.pem").exists());
//! ```
//!
//! # Modules
//!
//! - [`keystore`] - RSA key generation and loading
//! - [`ca`] - Root certificate authority
//! - [`issuer`] - Server certificate issuance
//! - [`chain`] - Chain file assembly
//! - [`provision`] - End-to-end runs
//! - [`validation`] - Certificate validation utilities
//! - [`persist`] - Atomic create-only file writes
//! - [`types`] - Core types (`Certificate`, `PrivateKey`, etc.)
//! - [`error`] - Error types

pub mod ca;
pub mod chain;
pub mod error;
pub mod issuer;
pub mod keystore;
pub mod persist;
pub mod provision;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use ca::{CA_VALIDITY_DAYS, CertificateAuthority};
pub use chain::{chain_pem, write_chain_if_absent};
pub use error::{Error, Result};
pub use issuer::{CertificateIssuer, SERVER_VALIDITY_DAYS};
pub use keystore::generate_or_load as generate_or_load_key;
pub use provision::{
    Artifact, ArtifactKind, ArtifactStatus, CA_CERT_FILE, CA_KEY_FILE, Host, ProvisionRequest,
    Report, provision,
};
pub use types::{Certificate, Name, NameTemplate, PrivateKey, SubjectAltName};
pub use validation::{
    is_expired, is_not_yet_valid, is_valid_now, validate_chain, validate_issued_by,
    validate_self_signed, validity_span,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::net::{IpAddr, Ipv4Addr};

    fn names() -> NameTemplate {
        NameTemplate {
            country: "US".into(),
            state: "California".into(),
            locality: "San Francisco".into(),
            organization: "Example Home".into(),
        }
    }

    #[test]
    fn full_workflow_test() {
        let dir = tempfile::tempdir().unwrap();
        let names = names();

        // 1. Root key and certificate
        let root_key = generate_or_load_key(&dir.path().join(CA_KEY_FILE)).unwrap();
        let ca = CertificateAuthority::generate_or_load(
            &dir.path().join(CA_CERT_FILE),
            root_key,
            &names,
        )
        .unwrap();
        assert_eq!(ca.root_certificate().subject(), "Example Home CA");
        validate_self_signed(ca.root_certificate()).unwrap();

        // 2. Host key and server certificate
        let host_key = generate_or_load_key(&dir.path().join("gateway.key.pem")).unwrap();
        let issuer = CertificateIssuer::new(&ca, &names);
        let leaf = issuer
            .generate_or_load(
                &dir.path().join("gateway.cert.pem"),
                &host_key,
                &[
                    SubjectAltName::dns("gateway.home.arpa"),
                    SubjectAltName::from(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))),
                ],
            )
            .unwrap();

        assert_eq!(leaf.subject(), "gateway.home.arpa");
        assert_eq!(leaf.issuer(), "Example Home CA");
        assert!(!is_expired(&leaf));
        assert_eq!(validity_span(&leaf), Duration::days(SERVER_VALIDITY_DAYS));

        // 3. Chain
        let chain_path = dir.path().join("gateway.chain.pem");
        assert!(write_chain_if_absent(&chain_path, ca.root_certificate(), &leaf).unwrap());
        validate_chain(&[leaf.clone(), ca.root_certificate().clone()]).unwrap();

        // 4. PEM export
        assert!(leaf.pem().contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn ca_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let names = names();
        let key_path = dir.path().join(CA_KEY_FILE);
        let cert_path = dir.path().join(CA_CERT_FILE);

        let ca1 = CertificateAuthority::generate_or_load(
            &cert_path,
            generate_or_load_key(&key_path).unwrap(),
            &names,
        )
        .unwrap();

        // A second process picks up the same key and root from disk
        let ca2 = CertificateAuthority::generate_or_load(
            &cert_path,
            generate_or_load_key(&key_path).unwrap(),
            &names,
        )
        .unwrap();
        assert_eq!(ca1.root_certificate(), ca2.root_certificate());

        let leaf = CertificateIssuer::new(&ca2, &names)
            .generate_or_load(
                &dir.path().join("test.cert.pem"),
                &PrivateKey::generate().unwrap(),
                &[SubjectAltName::dns("test.local")],
            )
            .unwrap();

        validate_issued_by(&leaf, ca1.root_certificate()).unwrap();
    }
}

//! Core PKI types: names, subject alternative names, certificates and keys.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use rcgen::{DistinguishedName, DnType, DnValue, PrintableString};
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, LineEnding};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, PrivateKeyInfo};
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use x509_parser::pem::parse_x509_pem;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// RSA modulus size for every generated key.
pub const RSA_KEY_BITS: usize = 2048;

/// RSA public exponent for every generated key.
pub const RSA_PUBLIC_EXPONENT: u32 = 65537;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// The organization-wide part of a distinguished name.
///
/// Every certificate this crate issues shares these four attributes and only
/// differs in its common name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTemplate {
    /// Two-letter country code.
    pub country: String,
    /// State or province.
    pub state: String,
    /// Locality (city).
    pub locality: String,
    /// Organization name; also forms the CA common name.
    pub organization: String,
}

impl NameTemplate {
    /// Builds a full name with the given common name.
    #[must_use]
    pub fn name(&self, common_name: impl Into<String>) -> Name {
        Name {
            country: self.country.clone(),
            state: self.state.clone(),
            locality: self.locality.clone(),
            organization: self.organization.clone(),
            common_name: common_name.into(),
        }
    }

    /// The root CA name: common name `"<organization> CA"`.
    #[must_use]
    pub fn ca_name(&self) -> Name {
        self.name(format!("{} CA", self.organization))
    }
}

/// A structured X.509 distinguished name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    /// Country (C).
    pub country: String,
    /// State or province (ST).
    pub state: String,
    /// Locality (L).
    pub locality: String,
    /// Organization (O).
    pub organization: String,
    /// Common name (CN).
    pub common_name: String,
}

impl Name {
    /// Converts to an rcgen distinguished name, attributes in C, ST, L, O, CN order.
    pub(crate) fn to_distinguished_name(&self) -> Result<DistinguishedName> {
        let country = PrintableString::try_from(self.country.clone()).map_err(|e| {
            Error::InvalidInput(format!("invalid country '{}': {e}", self.country))
        })?;

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CountryName, DnValue::PrintableString(country));
        dn.push(DnType::StateOrProvinceName, self.state.as_str());
        dn.push(DnType::LocalityName, self.locality.as_str());
        dn.push(DnType::OrganizationName, self.organization.as_str());
        dn.push(DnType::CommonName, self.common_name.as_str());
        Ok(dn)
    }
}

/// Subject Alternative Name entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectAltName {
    /// DNS name.
    Dns(String),
    /// IPv4 address.
    Ipv4(Ipv4Addr),
    /// IPv6 address.
    Ipv6(Ipv6Addr),
}

impl SubjectAltName {
    /// Creates a DNS entry.
    #[must_use]
    pub fn dns(name: impl Into<String>) -> Self {
        Self::Dns(name.into())
    }

    /// Classifies a string: IP literals become address entries, anything else a DNS name.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        value
            .parse::<IpAddr>()
            .map_or_else(|_| Self::Dns(value.to_string()), Self::from)
    }

    /// Returns the DNS name if this is a DNS entry.
    #[must_use]
    pub fn as_dns(&self) -> Option<&str> {
        match self {
            Self::Dns(name) => Some(name),
            Self::Ipv4(_) | Self::Ipv6(_) => None,
        }
    }

    /// Returns the IP address if this is an address entry.
    #[must_use]
    pub const fn as_ip(&self) -> Option<IpAddr> {
        match self {
            Self::Dns(_) => None,
            Self::Ipv4(ip) => Some(IpAddr::V4(*ip)),
            Self::Ipv6(ip) => Some(IpAddr::V6(*ip)),
        }
    }
}

impl From<IpAddr> for SubjectAltName {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::Ipv4(v4),
            IpAddr::V6(v6) => Self::Ipv6(v6),
        }
    }
}

impl From<Ipv4Addr> for SubjectAltName {
    fn from(ip: Ipv4Addr) -> Self {
        Self::Ipv4(ip)
    }
}

impl From<Ipv6Addr> for SubjectAltName {
    fn from(ip: Ipv6Addr) -> Self {
        Self::Ipv6(ip)
    }
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dns(name) => write!(f, "DNS:{name}"),
            Self::Ipv4(ip) => write!(f, "IP:{ip}"),
            Self::Ipv6(ip) => write!(f, "IP:{ip}"),
        }
    }
}

/// A DER-encoded X.509 certificate with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// DER-encoded certificate bytes.
    der: Vec<u8>,
    /// Certificate validity start time.
    not_before: DateTime<Utc>,
    /// Certificate validity end time.
    not_after: DateTime<Utc>,
    /// Subject common name (empty if absent).
    subject: String,
    /// Issuer common name (empty if absent).
    issuer: String,
    /// Encoded subject name.
    subject_der: Vec<u8>,
    /// Encoded issuer name.
    issuer_der: Vec<u8>,
    /// Subject alternative names.
    san: Vec<SubjectAltName>,
    /// Big-endian serial number.
    serial: Vec<u8>,
    /// `BasicConstraints` CA flag, `None` when the extension is absent.
    ca: Option<bool>,
    /// Encoded `SubjectPublicKeyInfo`.
    public_key: Vec<u8>,
}

impl Certificate {
    /// Parses a certificate from DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        use x509_parser::prelude::*;

        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_before timestamp".into()))?;
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_after timestamp".into()))?;

        let subject = extract_common_name(cert.subject())?.unwrap_or_default();
        let issuer = extract_common_name(cert.issuer())?.unwrap_or_default();
        let san = extract_san(&cert)?;
        let ca = cert
            .basic_constraints()
            .map_err(|e| Error::Parse(format!("invalid basic constraints: {e}")))?
            .map(|ext| ext.value.ca);

        Ok(Self {
            der: der.to_vec(),
            not_before,
            not_after,
            subject,
            issuer,
            subject_der: cert.subject().as_raw().to_vec(),
            issuer_der: cert.issuer().as_raw().to_vec(),
            san,
            serial: cert.raw_serial().to_vec(),
            ca,
            public_key: cert.public_key().raw.to_vec(),
        })
    }

    /// Parses the first `CERTIFICATE` block of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text holds no certificate block or the
    /// certificate itself is malformed.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let (_, block) = parse_x509_pem(pem)
            .map_err(|e| Error::Parse(format!("invalid PEM: {e}")))?;
        if block.label != CERTIFICATE_LABEL {
            return Err(Error::Parse(format!(
                "expected a {CERTIFICATE_LABEL} block, found '{}'",
                block.label
            )));
        }
        Self::from_der(&block.contents)
    }

    /// Returns the DER-encoded certificate bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the PEM-encoded certificate.
    #[must_use]
    pub fn pem(&self) -> String {
        encode_pem(CERTIFICATE_LABEL, &self.der)
    }

    /// Returns the certificate validity start time.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the certificate validity end time.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns the subject common name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the issuer common name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the encoded subject name.
    #[must_use]
    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    /// Returns the encoded issuer name.
    #[must_use]
    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    /// Returns the subject alternative names.
    #[must_use]
    pub fn san(&self) -> &[SubjectAltName] {
        &self.san
    }

    /// Returns the big-endian serial number bytes.
    #[must_use]
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Whether `BasicConstraints` marks this certificate as a CA.
    #[must_use]
    pub fn is_ca(&self) -> bool {
        self.ca == Some(true)
    }

    /// Whether the certificate carries a `BasicConstraints` extension at all.
    #[must_use]
    pub const fn has_basic_constraints(&self) -> bool {
        self.ca.is_some()
    }

    /// Returns the encoded `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Whether issuer and subject names are byte-identical.
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.subject_der == self.issuer_der
    }
}

/// Extracts the common name from an X.509 name.
fn extract_common_name(name: &x509_parser::x509::X509Name) -> Result<Option<String>> {
    for rdn in name.iter() {
        for attr in rdn.iter() {
            if attr.attr_type() == &x509_parser::oid_registry::OID_X509_COMMON_NAME {
                return attr
                    .as_str()
                    .map(|cn| Some(cn.to_string()))
                    .map_err(|e| Error::Parse(format!("failed to parse CN: {e}")));
            }
        }
    }
    Ok(None)
}

/// Extracts DNS and IP SANs from a certificate; other name forms are skipped.
fn extract_san(cert: &x509_parser::certificate::X509Certificate) -> Result<Vec<SubjectAltName>> {
    use x509_parser::extensions::GeneralName;

    let mut sans = Vec::new();

    let ext = cert
        .subject_alternative_name()
        .map_err(|e| Error::Parse(format!("invalid subject alternative name: {e}")))?;

    if let Some(san_ext) = ext {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => {
                    sans.push(SubjectAltName::Dns((*dns).to_string()));
                }
                GeneralName::IPAddress(ip_bytes) => {
                    if let Some(ip) = parse_ip_bytes(ip_bytes) {
                        sans.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(sans)
}

/// Parses iPAddress octets: 4 bytes for IPv4, 16 for IPv6.
fn parse_ip_bytes(bytes: &[u8]) -> Option<SubjectAltName> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(SubjectAltName::Ipv4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(SubjectAltName::Ipv6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

/// Encodes DER as a PEM block with 64-column base64 and LF line endings.
fn encode_pem(label: &str, der: &[u8]) -> String {
    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        // base64 output is ASCII, so every chunk is valid UTF-8.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// An RSA private key.
///
/// The inner key zeroizes its limbs on drop.
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

impl PrivateKey {
    /// Generates a fresh 2048-bit key with exponent 65537 from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate() -> Result<Self> {
        let exponent = rsa::BigUint::from(RSA_PUBLIC_EXPONENT);
        let inner = RsaPrivateKey::new_with_exp(&mut rand::rngs::OsRng, RSA_KEY_BITS, &exponent)
            .map_err(|e| Error::Generation(format!("failed to generate RSA key: {e}")))?;
        Ok(Self { inner })
    }

    /// Parses an unencrypted PEM private key.
    ///
    /// Accepts PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) blocks.
    /// Keys of other algorithms fail with [`Error::InvalidKeyType`].
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed, encrypted or not RSA.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let (_, block) = parse_x509_pem(pem)
            .map_err(|e| Error::Parse(format!("invalid PEM: {e}")))?;

        let inner = match block.label.as_str() {
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(&block.contents)
                .map_err(|e| Error::Parse(format!("invalid PKCS#1 key: {e}")))?,
            "PRIVATE KEY" => {
                let info = PrivateKeyInfo::try_from(block.contents.as_slice())
                    .map_err(|e| Error::Parse(format!("invalid PKCS#8 key: {e}")))?;
                if info.algorithm.oid != rsa::pkcs1::ALGORITHM_OID {
                    return Err(Error::InvalidKeyType(format!(
                        "algorithm {}",
                        info.algorithm.oid
                    )));
                }
                RsaPrivateKey::from_pkcs8_der(&block.contents)
                    .map_err(|e| Error::Parse(format!("invalid PKCS#8 RSA key: {e}")))?
            }
            "EC PRIVATE KEY" => return Err(Error::InvalidKeyType("EC".into())),
            "DSA PRIVATE KEY" => return Err(Error::InvalidKeyType("DSA".into())),
            "ENCRYPTED PRIVATE KEY" => {
                return Err(Error::Parse("encrypted private keys are not supported".into()));
            }
            other => {
                return Err(Error::Parse(format!("unexpected PEM block '{other}'")));
            }
        };

        Ok(Self { inner })
    }

    /// Returns the PKCS#1 PEM encoding (`RSA PRIVATE KEY`).
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_pem(&self) -> Result<Zeroizing<String>> {
        self.inner
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| Error::Generation(format!("failed to encode private key: {e}")))
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn modulus_bits(&self) -> usize {
        self.inner.size() * 8
    }

    /// Public exponent, if it fits in 64 bits.
    #[must_use]
    pub fn public_exponent(&self) -> Option<u64> {
        let bytes = self.inner.e().to_bytes_be();
        if bytes.len() > 8 {
            return None;
        }
        Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    /// Builds an rcgen signing key pair (SHA-256 with RSA).
    pub(crate) fn key_pair(&self) -> Result<rcgen::KeyPair> {
        let der = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| Error::Generation(format!("failed to encode private key: {e}")))?;
        rcgen::KeyPair::try_from(der.as_bytes())
            .map_err(|e| Error::Generation(format!("failed to load signing key: {e}")))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("bits", &self.modulus_bits())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

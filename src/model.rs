//! Records kept by the [`PkiManager`](crate::PkiManager).
//!
//! These are plain data: the manager owns every instance and hands out
//! clones, so callers never observe a record changing underneath them.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::cert::extensions::AltName;
use crate::error::{PkiError, Result};
use crate::key::SUPPORTED_RSA_KEY_SIZES;

/// Longest validity a request may ask for, in days.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Free-form annotations carried by records.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// What a certificate is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Ca,
    Server,
    Client,
    CodeSigning,
    Email,
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CertificateType::Ca => "ca",
            CertificateType::Server => "server",
            CertificateType::Client => "client",
            CertificateType::CodeSigning => "code_signing",
            CertificateType::Email => "email",
        })
    }
}

/// Lifecycle status of an issued certificate.
///
/// `Revoked` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Valid,
    Expired,
    Revoked,
    Pending,
    Suspended,
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CertificateStatus::Valid => "valid",
            CertificateStatus::Expired => "expired",
            CertificateStatus::Revoked => "revoked",
            CertificateStatus::Pending => "pending",
            CertificateStatus::Suspended => "suspended",
        })
    }
}

/// Workflow state of a certificate request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        })
    }
}

/// Asymmetric algorithm of the certificate key. Only RSA is issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[default]
    #[serde(rename = "RSA", alias = "rsa")]
    Rsa,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Rsa => f.write_str("RSA"),
        }
    }
}

/// An issued X.509 certificate as tracked by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    #[serde(rename = "type")]
    pub cert_type: CertificateType,
    /// RFC 4514 rendering of the subject name.
    pub subject: String,
    /// RFC 4514 rendering of the issuer name.
    pub issuer: String,
    /// Lowercase hex of the serial number bytes.
    pub serial_number: String,
    #[serde(with = "time::serde::rfc3339")]
    pub not_before: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
    pub status: CertificateStatus,
    pub key_size: usize,
    pub algorithm: KeyAlgorithm,
    /// Lowercase hex SHA-256 of the DER encoding.
    pub fingerprint: String,
    pub pem_data: String,
    /// PKCS#1 PEM; absent for views of CA certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Certificate {
    /// Whether `at` lies inside `[not_before, not_after]`.
    pub fn within_window(&self, at: OffsetDateTime) -> bool {
        self.not_before <= at && at <= self.not_after
    }
}

/// A pending ask for a certificate.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct CertificateRequest {
    #[builder(into)]
    pub id: String,
    #[serde(rename = "type")]
    pub cert_type: CertificateType,
    /// Common name of the certificate to issue.
    #[builder(into)]
    pub subject: String,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    #[builder(default = 2048)]
    pub key_size: usize,
    #[builder(default)]
    #[serde(default)]
    pub algorithm: KeyAlgorithm,
    #[builder(default = 365)]
    pub validity_days: u32,
    #[builder(default)]
    #[serde(default)]
    pub status: RequestStatus,
    #[builder(default, into)]
    #[serde(default)]
    pub requested_by: String,
    #[builder(default = OffsetDateTime::now_utc())]
    #[serde(with = "time::serde::rfc3339")]
    pub requested_at: OffsetDateTime,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub approved_at: Option<OffsetDateTime>,
    #[builder(default)]
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl CertificateRequest {
    /// Checks everything issuance would otherwise trip over later.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PkiError::InvalidInput("request id is empty".to_string()));
        }
        if self.subject.trim().is_empty() {
            return Err(PkiError::InvalidInput(format!(
                "request {} has an empty subject",
                self.id
            )));
        }
        if self.cert_type == CertificateType::Ca {
            return Err(PkiError::InvalidInput(format!(
                "request {} asks for a CA certificate; only leaf certificates are issued",
                self.id
            )));
        }
        if !SUPPORTED_RSA_KEY_SIZES.contains(&self.key_size) {
            return Err(PkiError::InvalidInput(format!(
                "request {} has unsupported key size {} (expected one of {:?})",
                self.id, self.key_size, SUPPORTED_RSA_KEY_SIZES
            )));
        }
        if self.validity_days == 0 {
            return Err(PkiError::InvalidInput(format!(
                "request {} has a zero validity period",
                self.id
            )));
        }
        if self.validity_days > MAX_VALIDITY_DAYS {
            return Err(PkiError::InvalidInput(format!(
                "request {} asks for {} days of validity (at most {MAX_VALIDITY_DAYS})",
                self.id, self.validity_days
            )));
        }
        for name in self.dns_names.iter().chain(&self.email_addresses) {
            if name.is_empty() || !name.is_ascii() {
                return Err(PkiError::InvalidInput(format!(
                    "request {} has invalid alternative name {name:?}",
                    self.id
                )));
            }
        }
        self.alt_names().map(|_| ())
    }

    /// Subject alternative names in DNS, e-mail, IP order.
    pub fn alt_names(&self) -> Result<Vec<AltName>> {
        let dns = self.dns_names.iter().cloned().map(AltName::Dns);
        let email = self.email_addresses.iter().cloned().map(AltName::Email);
        let ips = self
            .ip_addresses
            .iter()
            .map(|ip| {
                ip.parse::<IpAddr>().map(AltName::Ip).map_err(|_| {
                    PkiError::InvalidInput(format!(
                        "request {} has invalid IP address {ip:?}",
                        self.id
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(dns.chain(email).chain(ips).collect())
    }
}

/// A named signing authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateAuthority {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Self-signed view of the CA certificate, without private key.
    pub certificate: Certificate,
    /// PKCS#1 PEM of the signing key.
    pub private_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

pub mod extensions;
pub mod params;

use crate::error::PkiError;
pub type Result<T> = std::result::Result<T, PkiError>;
use der::{Decode, DecodePem, Encode, EncodePem};
use extensions::{
    AltName, BasicConstraints, SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use params::{CertificationRequestInfo, DistinguishedName, ExtensionParam, Validity};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::issuer::Issuer;
use crate::key::{KeyPair, PublicKey};

/// Represents the supported signature algorithms for certificates.
#[derive(Debug, Clone)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRsa,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            // RFC 4055 requires an explicit NULL parameter for RSA signatures.
            SignatureAlgorithm::Sha256WithRsa => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: Some(der::asn1::AnyRef::NULL.into()),
            },
        }
    }
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM
/// formats and to read back the fields the manager records.
#[derive(Debug, Clone)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Encodes the certificate into DER format.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    /// Encodes the certificate into PEM format.
    pub fn to_pem(&self) -> Result<String> {
        self.inner
            .to_pem(pkcs8::LineEnding::LF)
            .map_err(|e| PkiError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_der(der)?,
        })
    }

    /// Parses a single `CERTIFICATE` PEM block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        Ok(Self {
            inner: CertificateInner::from_pem(pem.as_bytes())?,
        })
    }

    /// RFC 4514 rendering of the subject.
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    /// RFC 4514 rendering of the issuer.
    pub fn issuer(&self) -> String {
        self.inner.tbs_certificate.issuer.to_string()
    }

    pub fn subject_name(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    pub fn common_name(&self) -> Option<String> {
        DistinguishedName::from_x509_name(self.subject_name()).common_name
    }

    /// Lowercase hex of the serial number bytes.
    pub fn serial_number(&self) -> String {
        hex::encode(self.inner.tbs_certificate.serial_number.as_bytes())
    }

    pub fn not_before(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_before.to_system_time())
    }

    pub fn not_after(&self) -> OffsetDateTime {
        OffsetDateTime::from(self.inner.tbs_certificate.validity.not_after.to_system_time())
    }

    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_x509spki(&self.inner.tbs_certificate.subject_public_key_info)
    }

    /// Lowercase hex SHA-256 over the DER encoding.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(hex::encode(Sha256::digest(self.to_der()?)))
    }

    fn extensions(&self) -> impl Iterator<Item = ExtensionParam> + '_ {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(|ext| ExtensionParam {
                oid: ext.extn_id,
                critical: ext.critical,
                value: ext.extn_value.as_bytes().to_vec(),
            })
    }

    fn find_extension<E: ToAndFromX509Extension>(&self) -> Result<Option<E>> {
        self.extensions()
            .find(|ext| ext.oid == E::OID)
            .map(|ext| ext.to_extension::<E>())
            .transpose()
    }

    pub fn is_ca(&self) -> Result<bool> {
        Ok(self
            .find_extension::<BasicConstraints>()?
            .is_some_and(|bc| bc.is_ca))
    }

    pub fn subject_alt_names(&self) -> Result<Vec<AltName>> {
        Ok(self
            .find_extension::<SubjectAltName>()?
            .map(|san| san.names)
            .unwrap_or_default())
    }

    /// The subject key identifier, or one derived from the public key when
    /// the extension is absent.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        match self.find_extension::<SubjectKeyIdentifier>()? {
            Some(ski) => Ok(ski.0),
            None => self.public_key()?.key_identifier(),
        }
    }

    /// Creates a new self-signed certificate.
    ///
    /// # Arguments
    /// * `cert_info` - The certification request information.
    /// * `key` - The key pair used to sign the certificate.
    /// * `validity` - The validity window.
    /// * `serial_number` - Big-endian serial number bytes.
    pub fn new_self_signed(
        cert_info: &CertificationRequestInfo,
        key: &KeyPair,
        validity: Validity,
        serial_number: Vec<u8>,
    ) -> Result<Self> {
        // For self-signed certificates, the issuer is the same as the subject
        let self_issuer = SelfIssuer {
            name: cert_info.subject.as_x509_name()?,
            key,
        };
        self_issuer.issue(cert_info, validity, serial_number)
    }
}

// Helper struct for self-signed certificates
struct SelfIssuer<'a> {
    name: Name,
    key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        Ok(self.name.clone())
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }

    fn issuer_key_identifier(&self) -> Result<Vec<u8>> {
        self.key.public_key().key_identifier()
    }
}

/// A CA certificate together with the key that signs on its behalf.
#[derive(Debug, Clone)]
pub struct CertificateWithPrivateKey {
    pub cert: Certificate,
    pub key: KeyPair,
}

impl CertificateWithPrivateKey {
    /// Parses a certificate and its PKCS#1 key, refusing a key that does not
    /// belong to the certificate.
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let cert = Certificate::from_pem(cert_pem)?;
        let key = KeyPair::from_pkcs1_pem(key_pem)?;
        if cert.public_key()? != key.public_key() {
            return Err(PkiError::KeyMismatch(cert.subject()));
        }
        Ok(Self { cert, key })
    }
}

impl Issuer for CertificateWithPrivateKey {
    fn issuer_name(&self) -> Result<Name> {
        // The name of the issuer is the subject of the certificate
        Ok(self.cert.subject_name().clone())
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key
    }

    fn issuer_key_identifier(&self) -> Result<Vec<u8>> {
        self.cert.key_identifier()
    }
}

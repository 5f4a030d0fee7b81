use der::Encode;
use der::flagset::FlagSet;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages,
    SubjectAltName, SubjectKeyIdentifier,
};
use crate::cert::params::{CertificationRequestInfo, ExtensionParam, Validity};
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;

    /// Key identifier placed in the Authority Key Identifier of issued certificates.
    fn issuer_key_identifier(&self) -> Result<Vec<u8>>;

    /// Issues a certificate based on the provided certification request information.
    ///
    /// # Arguments
    /// * `cert_request` - Subject, public key, usages and alternative names of the certificate.
    /// * `validity` - The validity window.
    /// * `serial_number` - Big-endian serial number bytes.
    ///
    /// # Returns
    /// The signed `Certificate`.
    fn issue(
        &self,
        cert_request: &CertificationRequestInfo,
        validity: Validity,
        serial_number: Vec<u8>,
    ) -> Result<Certificate> {
        let signature_algo = SignatureAlgorithm::Sha256WithRsa;
        let issuer_key_id = self.issuer_key_identifier()?;
        let subject_key_id = cert_request.subject_public_key.key_identifier()?;
        let self_signed = issuer_key_id == subject_key_id;

        let basic_constraints = BasicConstraints {
            is_ca: cert_request.is_ca,
            max_path_length: cert_request.max_path_length.filter(|_| cert_request.is_ca),
        };

        let mut extensions: Vec<ExtensionParam> = vec![
            ExtensionParam::from_extension(basic_constraints, true)?,
            ExtensionParam::from_extension(SubjectKeyIdentifier(subject_key_id), false)?,
        ];

        if !self_signed {
            let authority_key_id = AuthorityKeyIdentifier {
                key_identifier: issuer_key_id,
            };
            extensions.push(ExtensionParam::from_extension(authority_key_id, false)?);
        }

        let mut key_usage_flags: FlagSet<KeyUsages> =
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment;
        if cert_request.is_ca {
            key_usage_flags |= KeyUsages::KeyCertSign;
        }
        extensions.push(ExtensionParam::from_extension(
            KeyUsage(key_usage_flags),
            true,
        )?);

        if !cert_request.usages.is_empty() {
            let extended_key_usage = ExtendedKeyUsage {
                usage: cert_request.usages.clone(),
            };
            extensions.push(ExtensionParam::from_extension(extended_key_usage, false)?);
        }

        if !cert_request.alt_names.is_empty() {
            let san = SubjectAltName {
                names: cert_request.alt_names.clone(),
            };
            extensions.push(ExtensionParam::from_extension(san, false)?);
        }

        let combined_extensions = cert_request
            .extensions
            .iter()
            .cloned()
            .chain(extensions)
            .collect();

        let tbs_cert = TbsCertificate {
            serial_number,
            signature_algorithm: signature_algo.clone(),
            issuer: self.issuer_name()?,
            not_before: validity.not_before,
            not_after: validity.not_after,
            subject: cert_request.subject.as_x509_name()?,
            subject_public_key: cert_request.subject_public_key.clone(),
            extensions: combined_extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner()?;
        let signature = self.signing_key().sign_data(&tbs_cert_inner.to_der()?)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signature_algo.into(),
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| PkiError::EncodingError(e.to_string()))?,
        };

        Ok(Certificate { inner: cert_inner })
    }
}

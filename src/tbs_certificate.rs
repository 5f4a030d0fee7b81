use std::time::SystemTime;

use der::asn1::OctetString;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::cert::SignatureAlgorithm;
use crate::cert::params::ExtensionParam;
use crate::error::PkiError;
use crate::key::PublicKey;

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
/// This struct contains all the fields required to generate a valid X.509 certificate.
///
/// # Fields
/// * `serial_number` - Big-endian bytes of a positive serial number.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `not_before` - The start of the certificate's validity period.
/// * `not_after` - The end of the certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key` - The public key of the certificate subject.
/// * `extensions` - Additional X.509 extensions for the certificate.
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub not_before: time::OffsetDateTime,
    pub not_after: time::OffsetDateTime,
    pub subject: Name,
    pub subject_public_key: PublicKey,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner, PkiError> {
        if self.not_after < self.not_before {
            return Err(PkiError::InvalidInput(
                "notAfter precedes notBefore".to_string(),
            ));
        }

        let extensions = self
            .extensions
            .iter()
            .map(|ext| {
                Ok(x509_cert::ext::Extension {
                    extn_id: ext.oid,
                    critical: ext.critical,
                    extn_value: OctetString::new(ext.value.clone())?,
                })
            })
            .collect::<Result<Vec<_>, der::Error>>()?;

        // UTCTime up to 2049, GeneralizedTime afterwards
        let validity = x509_cert::time::Validity {
            not_before: x509_cert::time::Time::try_from(SystemTime::from(self.not_before))?,
            not_after: x509_cert::time::Time::try_from(SystemTime::from(self.not_after))?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.clone().into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key.to_x509spki()?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }
}

//! Minting of certificates from requests.
//!
//! Everything here is a pure function of its arguments plus fresh
//! randomness; registries and locking live in the manager.

use time::OffsetDateTime;
use tracing::debug;

use crate::cert::extensions::ExtendedKeyUsageOption;
use crate::cert::params::{CertificationRequestInfo, DistinguishedName, Validity};
use crate::cert::{Certificate as X509Certificate, CertificateWithPrivateKey};
use crate::error::Result;
use crate::issuer::Issuer;
use crate::key::KeyPair;
use crate::model::{
    Certificate, CertificateRequest, CertificateStatus, CertificateType, KeyAlgorithm, Metadata,
};

/// Extended key usages placed in every issued certificate.
pub const DEFAULT_USAGES: [ExtendedKeyUsageOption; 2] = [
    ExtendedKeyUsageOption::ServerAuth,
    ExtendedKeyUsageOption::ClientAuth,
];

/// A random positive 127-bit serial number, big-endian.
pub fn random_serial() -> Vec<u8> {
    let mut serial: [u8; 16] = rand::random();
    // clear the sign bit and keep the encoding minimal
    serial[0] = (serial[0] & 0x7f) | 0x01;
    serial.to_vec()
}

/// Issues a leaf certificate for `request`, signed by `signer`.
///
/// A fresh key pair of `request.key_size` bits is generated; its PKCS#1 PEM
/// is returned in `private_key`. The record is keyed by the request ID.
pub fn issue_leaf(
    request: &CertificateRequest,
    signer: &CertificateWithPrivateKey,
) -> Result<Certificate> {
    let validity = Validity::for_days(i64::from(request.validity_days))?;
    let key = KeyPair::generate_rsa(request.key_size)?;

    let cert_info = CertificationRequestInfo::builder()
        .subject(DistinguishedName::from_common_name(request.subject.clone()))
        .subject_public_key(key.public_key())
        .usages(DEFAULT_USAGES.to_vec())
        .alt_names(request.alt_names()?)
        .build();

    let cert = signer.issue(&cert_info, validity, random_serial())?;
    debug!(
        request_id = %request.id,
        serial = %cert.serial_number(),
        "signed leaf certificate"
    );

    certificate_record(
        request.id.clone(),
        request.cert_type,
        request.algorithm,
        &cert,
        Some(key.to_pkcs1_pem()?),
    )
}

/// Builds the manager's view of an X.509 certificate.
pub fn certificate_record(
    id: String,
    cert_type: CertificateType,
    algorithm: KeyAlgorithm,
    cert: &X509Certificate,
    private_key: Option<String>,
) -> Result<Certificate> {
    let now = OffsetDateTime::now_utc();
    Ok(Certificate {
        id,
        cert_type,
        subject: cert.subject(),
        issuer: cert.issuer(),
        serial_number: cert.serial_number(),
        not_before: cert.not_before(),
        not_after: cert.not_after(),
        status: CertificateStatus::Valid,
        key_size: cert.public_key()?.key_size(),
        algorithm,
        fingerprint: cert.fingerprint()?,
        pem_data: cert.to_pem()?,
        private_key,
        created_at: now,
        updated_at: now,
        metadata: Metadata::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::Certificate as X509;

    fn signer() -> CertificateWithPrivateKey {
        let key = KeyPair::generate_rsa(2048).unwrap();
        let info = CertificationRequestInfo::builder()
            .subject(DistinguishedName::from_common_name("issuance test CA"))
            .subject_public_key(key.public_key())
            .is_ca(true)
            .max_path_length(2)
            .build();
        let cert = X509::new_self_signed(&info, &key, Validity::for_days(30).unwrap(), vec![1]).unwrap();
        CertificateWithPrivateKey { cert, key }
    }

    #[test]
    fn test_random_serial_is_positive_and_minimal() {
        for _ in 0..64 {
            let serial = random_serial();
            assert_eq!(serial.len(), 16);
            assert!(serial[0] & 0x80 == 0);
            assert!(serial[0] != 0);
        }
        assert_ne!(random_serial(), random_serial());
    }

    #[test]
    fn test_issue_leaf_populates_record() {
        let signer = signer();
        let request = CertificateRequest::builder()
            .id("leaf-1")
            .cert_type(CertificateType::Client)
            .subject("client-a")
            .dns_names(vec!["client-a.internal".to_string()])
            .ip_addresses(vec!["10.1.2.3".to_string()])
            .validity_days(30)
            .build();

        let record = issue_leaf(&request, &signer).unwrap();
        assert_eq!(record.id, "leaf-1");
        assert_eq!(record.cert_type, CertificateType::Client);
        assert_eq!(record.subject, "CN=client-a");
        assert_eq!(record.issuer, signer.cert.subject());
        assert_eq!(record.status, CertificateStatus::Valid);
        assert_eq!(record.key_size, 2048);
        assert_eq!((record.not_after - record.not_before).whole_days(), 30);

        let parsed = X509::from_pem(&record.pem_data).unwrap();
        assert!(!parsed.is_ca().unwrap());
        assert_eq!(parsed.subject_alt_names().unwrap(), request.alt_names().unwrap());
        let key = KeyPair::from_pkcs1_pem(record.private_key.as_deref().unwrap()).unwrap();
        assert_eq!(key.public_key(), parsed.public_key().unwrap());
    }
}

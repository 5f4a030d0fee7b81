//! Root certificate authority bootstrap.
//!
//! The root lives in two files under the storage directory:
//! `root-ca.pem` (0644) and `root-ca-key.pem` (0600, PKCS#1). The first
//! manager to run in an empty directory generates them; later managers load
//! them.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::info;

use crate::cert::params::{CertificationRequestInfo, Validity};
use crate::cert::{Certificate as X509Certificate, CertificateWithPrivateKey};
use crate::config::ManagerConfig;
use crate::error::{PkiError, Result};
use crate::issuance::{DEFAULT_USAGES, certificate_record};
use crate::key::KeyPair;
use crate::model::{CertificateAuthority, CertificateType, KeyAlgorithm, Metadata};

/// Key of the root in the authority table.
pub const ROOT_CA_ID: &str = "root";
/// ID of the root's embedded certificate view.
pub const ROOT_CERTIFICATE_ID: &str = "root-ca";
pub const ROOT_CERT_FILE: &str = "root-ca.pem";
pub const ROOT_KEY_FILE: &str = "root-ca-key.pem";

const ROOT_NAME: &str = "PeerVault Root CA";
const ROOT_DESCRIPTION: &str = "Root Certificate Authority for PeerVault";
const ROOT_PATH_LENGTH: u8 = 2;

/// Loads the root CA from `config.storage_path`, generating and persisting
/// it first if `root-ca.pem` does not exist yet.
pub fn bootstrap_root(config: &ManagerConfig) -> Result<CertificateAuthority> {
    let dir = &config.storage_path;
    fs::create_dir_all(dir).map_err(|source| PkiError::StorageDirectory {
        path: dir.clone(),
        source,
    })?;

    let cert_path = dir.join(ROOT_CERT_FILE);
    if cert_path.exists() {
        let ca = load_root(dir)?;
        info!(
            path = %cert_path.display(),
            subject = %ca.certificate.subject,
            "loaded root CA"
        );
        return Ok(ca);
    }

    let ca = generate_root(config)?;
    save_root(dir, &ca)?;
    info!(
        path = %cert_path.display(),
        subject = %ca.certificate.subject,
        key_size = config.root_key_size,
        "generated root CA"
    );
    Ok(ca)
}

/// Generates a self-signed root: serial 1, `root_validity_years` of
/// validity, CA with path length 2.
pub fn generate_root(config: &ManagerConfig) -> Result<CertificateAuthority> {
    let validity = Validity::for_years(config.root_validity_years)?;
    let key = KeyPair::generate_rsa(config.root_key_size)?;

    let cert_info = CertificationRequestInfo::builder()
        .subject(config.root_subject.clone())
        .subject_public_key(key.public_key())
        .usages(DEFAULT_USAGES.to_vec())
        .is_ca(true)
        .max_path_length(ROOT_PATH_LENGTH)
        .build();

    let cert = X509Certificate::new_self_signed(
        &cert_info,
        &key,
        validity,
        vec![1],
    )?;

    authority_record(&cert, key.to_pkcs1_pem()?)
}

/// Reads and parses both root files from `dir`.
pub fn load_root(dir: &Path) -> Result<CertificateAuthority> {
    let cert_pem = read_file(&dir.join(ROOT_CERT_FILE), "load root CA certificate")?;
    let key_pem = read_file(&dir.join(ROOT_KEY_FILE), "load root CA private key")?;

    let signer = CertificateWithPrivateKey::from_pem(&cert_pem, &key_pem)?;
    if !signer.cert.is_ca()? {
        return Err(PkiError::CertificateError(format!(
            "{} is not a CA certificate",
            dir.join(ROOT_CERT_FILE).display()
        )));
    }
    authority_record(&signer.cert, key_pem)
}

/// The signer for issuing under `ca`.
pub fn signer(ca: &CertificateAuthority) -> Result<CertificateWithPrivateKey> {
    CertificateWithPrivateKey::from_pem(&ca.certificate.pem_data, &ca.private_key)
}

fn authority_record(cert: &X509Certificate, key_pem: String) -> Result<CertificateAuthority> {
    let certificate = certificate_record(
        ROOT_CERTIFICATE_ID.to_string(),
        CertificateType::Ca,
        KeyAlgorithm::Rsa,
        cert,
        None,
    )?;
    let now = OffsetDateTime::now_utc();
    Ok(CertificateAuthority {
        id: ROOT_CA_ID.to_string(),
        name: ROOT_NAME.to_string(),
        description: ROOT_DESCRIPTION.to_string(),
        certificate,
        private_key: key_pem,
        created_at: now,
        updated_at: now,
        metadata: Metadata::new(),
    })
}

fn save_root(dir: &Path, ca: &CertificateAuthority) -> Result<()> {
    write_file(
        &dir.join(ROOT_CERT_FILE),
        ca.certificate.pem_data.as_bytes(),
        0o644,
        "save root CA certificate",
    )?;
    write_file(
        &dir.join(ROOT_KEY_FILE),
        ca.private_key.as_bytes(),
        0o600,
        "save root CA private key",
    )
}

fn read_file(path: &Path, action: &'static str) -> Result<String> {
    fs::read_to_string(path).map_err(|source| PkiError::Io {
        action,
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `contents` to `path`, creating it with `mode` on unix.
pub(crate) fn write_file(
    path: &Path,
    contents: &[u8],
    #[cfg_attr(not(unix), allow(unused_variables))] mode: u32,
    action: &'static str,
) -> Result<()> {
    let io_err = |source| PkiError::Io {
        action,
        path: PathBuf::from(path),
        source,
    };

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(contents).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    // `mode` only applies on creation
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> ManagerConfig {
        ManagerConfig::builder()
            .storage_path(dir)
            .root_key_size(2048)
            .build()
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = bootstrap_root(&config(dir.path())).unwrap();
        let second = bootstrap_root(&config(dir.path())).unwrap();

        assert_eq!(first.certificate.pem_data, second.certificate.pem_data);
        assert_eq!(first.private_key, second.private_key);
        assert_eq!(second.id, ROOT_CA_ID);
        assert_eq!(second.certificate.id, ROOT_CERTIFICATE_ID);
        assert!(second.certificate.private_key.is_none());
    }

    #[test]
    fn test_root_certificate_shape() {
        let dir = tempfile::tempdir().unwrap();
        let ca = bootstrap_root(&config(dir.path())).unwrap();
        let cert = X509Certificate::from_pem(&ca.certificate.pem_data).unwrap();

        assert!(cert.is_ca().unwrap());
        assert_eq!(cert.serial_number(), "01");
        assert_eq!(ca.certificate.subject, ca.certificate.issuer);
        assert_eq!(ca.certificate.subject, "O=PeerVault Root CA,L=San Francisco,C=US");
        let years = (ca.certificate.not_after - ca.certificate.not_before).whole_days() / 365;
        assert_eq!(years, 10);
    }

    #[cfg(unix)]
    #[test]
    fn test_root_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        bootstrap_root(&config(dir.path())).unwrap();
        let mode = |name: &str| {
            fs::metadata(dir.path().join(name))
                .unwrap()
                .permissions()
                .mode()
                & 0o777
        };
        assert_eq!(mode(ROOT_CERT_FILE), 0o644);
        assert_eq!(mode(ROOT_KEY_FILE), 0o600);
    }

    #[test]
    fn test_root_validity_past_year_9999_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ManagerConfig::builder()
            .storage_path(dir.path())
            .root_key_size(2048)
            .root_validity_years(20_000)
            .build();

        assert!(matches!(
            bootstrap_root(&config),
            Err(PkiError::InvalidInput(_))
        ));
        assert!(!dir.path().join(ROOT_CERT_FILE).exists());
    }

    #[test]
    fn test_missing_key_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        bootstrap_root(&config(dir.path())).unwrap();
        fs::remove_file(dir.path().join(ROOT_KEY_FILE)).unwrap();

        let err = bootstrap_root(&config(dir.path())).unwrap_err();
        assert!(matches!(err, PkiError::Io { .. }));
    }

    #[test]
    fn test_garbage_certificate_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        bootstrap_root(&config(dir.path())).unwrap();
        fs::write(dir.path().join(ROOT_CERT_FILE), "not a certificate").unwrap();

        assert!(bootstrap_root(&config(dir.path())).is_err());
    }
}

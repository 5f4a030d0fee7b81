//! Process-wide manager.
//!
//! [`initialize`] installs one [`PkiManager`] for the lifetime of the
//! process; the free functions here forward to it. Before initialization
//! the fallible operations return [`PkiError::NotInitialized`] and the
//! lookups come back empty.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::config::ManagerConfig;
use crate::error::{PkiError, Result};
use crate::manager::PkiManager;
use crate::model::{Certificate, CertificateAuthority, CertificateRequest};
use crate::tls::TlsConfig;

static MANAGER: OnceLock<Arc<PkiManager>> = OnceLock::new();

/// Creates the global manager with default settings under `storage_path`.
pub fn initialize(storage_path: impl Into<PathBuf>) -> Result<()> {
    initialize_with_config(ManagerConfig::new(storage_path))
}

/// Creates the global manager. Fails with [`PkiError::AlreadyInitialized`]
/// on every call after the first successful one.
pub fn initialize_with_config(config: ManagerConfig) -> Result<()> {
    if MANAGER.get().is_some() {
        return Err(PkiError::AlreadyInitialized);
    }
    let path = config.storage_path.clone();
    let manager = Arc::new(PkiManager::with_config(config)?);
    MANAGER
        .set(manager)
        .map_err(|_| PkiError::AlreadyInitialized)?;
    info!(path = %path.display(), "initialized global PKI manager");
    Ok(())
}

/// The global manager, if [`initialize`] has succeeded.
pub fn manager() -> Option<Arc<PkiManager>> {
    MANAGER.get().cloned()
}

fn require() -> Result<&'static PkiManager> {
    MANAGER
        .get()
        .map(Arc::as_ref)
        .ok_or(PkiError::NotInitialized)
}

pub fn create_certificate_request(request: CertificateRequest) -> Result<()> {
    require()?.create_certificate_request(request)
}

pub fn approve_certificate_request(request_id: &str, approved_by: &str) -> Result<Certificate> {
    require()?.approve_certificate_request(request_id, approved_by)
}

pub fn reject_certificate_request(request_id: &str, rejected_by: &str) -> Result<()> {
    require()?.reject_certificate_request(request_id, rejected_by)
}

pub fn get_certificate(cert_id: &str) -> Option<Certificate> {
    MANAGER.get()?.get_certificate(cert_id)
}

pub fn list_certificates() -> Vec<Certificate> {
    MANAGER
        .get()
        .map(|m| m.list_certificates())
        .unwrap_or_default()
}

pub fn revoke_certificate(cert_id: &str, reason: &str) -> Result<()> {
    require()?.revoke_certificate(cert_id, reason)
}

pub fn check_certificate_validity(cert_id: &str) -> Result<bool> {
    require()?.check_certificate_validity(cert_id)
}

pub fn tls_config(cert_id: &str) -> Result<TlsConfig> {
    require()?.tls_config(cert_id)
}

pub fn rotate_certificate(cert_id: &str) -> Result<Certificate> {
    require()?.rotate_certificate(cert_id)
}

pub fn get_certificate_authority(ca_id: &str) -> Option<CertificateAuthority> {
    MANAGER.get()?.get_certificate_authority(ca_id)
}

pub fn list_certificate_authorities() -> Vec<CertificateAuthority> {
    MANAGER
        .get()
        .map(|m| m.list_certificate_authorities())
        .unwrap_or_default()
}

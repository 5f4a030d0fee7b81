#![allow(dead_code)]

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use vaultpki::{
    Certificate, CertificateRequest, CertificateType, ManagerConfig, PkiManager,
};

/// Routes manager logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A manager over a fresh temporary directory with a 2048-bit root.
pub fn manager() -> (TempDir, PkiManager) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let manager = PkiManager::with_config(config(&dir)).unwrap();
    (dir, manager)
}

pub fn config(dir: &TempDir) -> ManagerConfig {
    ManagerConfig::builder()
        .storage_path(dir.path())
        .root_key_size(2048)
        .build()
}

pub fn server_request(id: &str, subject: &str) -> CertificateRequest {
    CertificateRequest::builder()
        .id(id)
        .cert_type(CertificateType::Server)
        .subject(subject)
        .dns_names(vec![subject.to_string()])
        .ip_addresses(vec!["127.0.0.1".to_string()])
        .requested_by("node-agent")
        .build()
}

/// Creates and approves a server request.
pub fn issue_server_cert(manager: &PkiManager, id: &str, subject: &str) -> Certificate {
    manager
        .create_certificate_request(server_request(id, subject))
        .unwrap();
    manager.approve_certificate_request(id, "admin").unwrap()
}

mod util;

use vaultpki::global;
use vaultpki::{CertificateStatus, PkiError};

/// The global manager is process-wide, so its whole lifecycle lives in one
/// test binary with a single test.
#[test]
fn global_manager_lifecycle() {
    assert!(global::manager().is_none());
    assert!(matches!(
        global::create_certificate_request(util::server_request("srv-1", "node-1")),
        Err(PkiError::NotInitialized)
    ));
    assert!(matches!(
        global::check_certificate_validity("srv-1"),
        Err(PkiError::NotInitialized)
    ));
    assert!(global::get_certificate("srv-1").is_none());
    assert!(global::list_certificates().is_empty());
    assert!(global::list_certificate_authorities().is_empty());

    let dir = tempfile::tempdir().unwrap();
    global::initialize_with_config(util::config(&dir)).unwrap();
    assert!(matches!(
        global::initialize(dir.path()),
        Err(PkiError::AlreadyInitialized)
    ));

    global::create_certificate_request(util::server_request("srv-1", "node-1")).unwrap();
    global::create_certificate_request(util::server_request("srv-2", "node-2")).unwrap();
    let cert = global::approve_certificate_request("srv-1", "admin").unwrap();
    global::reject_certificate_request("srv-2", "admin").unwrap();

    assert_eq!(global::get_certificate("srv-1"), Some(cert));
    assert!(global::check_certificate_validity("srv-1").unwrap());
    global::tls_config("srv-1").unwrap();

    let rotated = global::rotate_certificate("srv-1").unwrap();
    assert_eq!(
        global::get_certificate("srv-1").unwrap().status,
        CertificateStatus::Revoked
    );
    global::revoke_certificate(&rotated.id, "test").unwrap();
    assert!(!global::check_certificate_validity(&rotated.id).unwrap());

    assert_eq!(global::list_certificates().len(), 2);
    assert_eq!(global::list_certificate_authorities().len(), 1);
    assert!(global::get_certificate_authority("root").is_some());

    let manager = global::manager().unwrap();
    assert_eq!(manager.list_certificates().len(), 2);
}

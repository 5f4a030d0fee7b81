//! # VaultPKI - Certificate Authority and Lifecycle Manager
//!
//! VaultPKI runs a self-contained root certificate authority for a
//! distributed storage cluster and manages the certificates it issues:
//! request intake, approval, issuance, revocation, expiry tracking,
//! rotation and export as TLS material. X.509 encoding and signing are done
//! with the rustcrypto crates; TLS configurations are built for rustls.
//!
//! ## Storage Layout
//!
//! The manager owns one directory:
//!
//! - `root-ca.pem`: the root certificate (mode 0644)
//! - `root-ca-key.pem`: the root's PKCS#1 private key (mode 0600)
//! - `registry.json`: requests and issued certificates, only when
//!   [`ManagerConfig::persist_registry`] is set (mode 0600)
//!
//! The root is generated on first start and loaded on every later one.
//!
//! ## Certificate Lifecycle
//!
//! - A [`CertificateRequest`] is created in the `pending` state.
//! - Approval generates an RSA key, signs a leaf certificate with the root
//!   and stores it as `valid` under the request's ID. Rejection ends the
//!   request without issuing anything.
//! - A `valid` certificate becomes `revoked` explicitly, or `expired` the
//!   first time a validity check finds it outside its window.
//! - Rotation issues a replacement and revokes the original.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vaultpki::{CertificateRequest, CertificateType, PkiManager};
//!
//! # fn main() -> Result<(), vaultpki::PkiError> {
//! let manager = PkiManager::new("/var/lib/peervault/pki")?;
//!
//! manager.create_certificate_request(
//!     CertificateRequest::builder()
//!         .id("srv-1")
//!         .cert_type(CertificateType::Server)
//!         .subject("storage-node-1")
//!         .dns_names(vec!["storage-node-1.cluster.local".to_string()])
//!         .ip_addresses(vec!["10.0.0.11".to_string()])
//!         .build(),
//! )?;
//!
//! let cert = manager.approve_certificate_request("srv-1", "admin")?;
//! assert!(manager.check_certificate_validity(&cert.id)?);
//!
//! // rustls server configuration presenting the new certificate
//! let server_config = manager.tls_config(&cert.id)?.server_config()?;
//! # let _ = server_config;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`PkiError`]:
//!
//! ```rust,no_run
//! use vaultpki::{PkiError, PkiManager};
//!
//! # fn main() -> Result<(), PkiError> {
//! let manager = PkiManager::new("/var/lib/peervault/pki")?;
//! match manager.approve_certificate_request("missing", "admin") {
//!     Ok(cert) => println!("issued {}", cert.serial_number),
//!     Err(PkiError::RequestNotFound(id)) => println!("no request {id}"),
//!     Err(PkiError::RequestNotPending(id)) => println!("{id} already decided"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`manager`]: The [`PkiManager`] and every lifecycle operation
//! - [`global`]: Optional process-wide manager with free-function wrappers
//! - [`model`]: Requests, certificates and authorities as tracked records
//! - [`authority`]: Root CA generation, loading and on-disk layout
//! - [`issuance`]: Leaf certificate minting
//! - [`tls`]: rustls configurations from issued certificates
//! - [`config`]: Manager settings
//! - [`store`]: Optional JSON snapshot of the registries
//! - [`key`]: RSA key generation, import/export and signing
//! - [`cert`]: X.509 certificate creation, encoding and extensions
//! - [`issuer`]: Certificate signing by a CA
//! - [`tbs_certificate`]: Low-level certificate structure assembly
//! - [`error`]: Error types

pub mod authority;
pub mod cert;
pub mod config;
pub mod error;
pub mod global;
pub mod issuance;
pub mod issuer;
pub mod key;
pub mod manager;
pub mod model;
pub mod pem_utils;
pub mod store;
pub mod tbs_certificate;
pub mod tls;

pub use config::ManagerConfig;
pub use error::{PkiError, Result};
pub use manager::PkiManager;
pub use model::{
    Certificate, CertificateAuthority, CertificateRequest, CertificateStatus, CertificateType,
    KeyAlgorithm, RequestStatus,
};
pub use tls::TlsConfig;

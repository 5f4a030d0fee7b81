//! Transport-security configuration built from an issued certificate.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs1KeyDer};
use rustls::{ClientConfig, ProtocolVersion, RootCertStore, ServerConfig, SupportedProtocolVersion};

use crate::cert::Certificate as X509Certificate;
use crate::error::{PkiError, Result};
use crate::key::KeyPair;
use crate::model::Certificate;
use crate::pem_utils::pem_to_der;

/// Oldest protocol version any exported configuration negotiates.
pub const MIN_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::TLSv1_2;

static PROTOCOL_VERSIONS: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// One certificate and its private key, ready to be turned into rustls
/// server or client configurations pinned to TLS 1.2 and later.
#[derive(Debug)]
pub struct TlsConfig {
    certificate: CertificateDer<'static>,
    private_key: PrivateKeyDer<'static>,
}

impl Clone for TlsConfig {
    fn clone(&self) -> Self {
        Self {
            certificate: self.certificate.clone(),
            private_key: self.private_key.clone_key(),
        }
    }
}

impl TlsConfig {
    /// Fails for records without a private key (CA views) and for keys
    /// that do not belong to the certificate.
    pub fn from_certificate(cert: &Certificate) -> Result<Self> {
        let key_pem = cert.private_key.as_deref().ok_or_else(|| {
            PkiError::Tls(format!("certificate {} carries no private key", cert.id))
        })?;

        let cert_der = pem_to_der(&cert.pem_data, "CERTIFICATE")?;
        let key_der = pem_to_der(key_pem, "RSA PRIVATE KEY")?;

        let parsed = X509Certificate::from_der(&cert_der)?;
        let key = KeyPair::from_pkcs1_pem(key_pem)?;
        if parsed.public_key()? != key.public_key() {
            return Err(PkiError::KeyMismatch(cert.id.clone()));
        }

        Ok(Self {
            certificate: CertificateDer::from(cert_der),
            private_key: PrivateKeyDer::Pkcs1(PrivatePkcs1KeyDer::from(key_der)),
        })
    }

    pub fn min_protocol_version(&self) -> ProtocolVersion {
        MIN_PROTOCOL_VERSION
    }

    /// The certificate chain presented to peers: exactly the one leaf.
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        std::slice::from_ref(&self.certificate)
    }

    /// A server configuration presenting this certificate, without client
    /// authentication.
    pub fn server_config(&self) -> Result<ServerConfig> {
        Ok(ServerConfig::builder_with_provider(provider())
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_no_client_auth()
            .with_single_cert(self.certificates().to_vec(), self.private_key.clone_key())?)
    }

    /// A client configuration trusting `roots` and presenting this
    /// certificate when the server asks for one.
    pub fn client_config(&self, roots: RootCertStore) -> Result<ClientConfig> {
        Ok(ClientConfig::builder_with_provider(provider())
            .with_protocol_versions(PROTOCOL_VERSIONS)?
            .with_root_certificates(roots)
            .with_client_auth_cert(self.certificates().to_vec(), self.private_key.clone_key())?)
    }
}

/// Trust store holding the given CA certificate PEM.
pub fn root_store(ca_pem: &str) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(pem_to_der(ca_pem, "CERTIFICATE")?))?;
    Ok(roots)
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

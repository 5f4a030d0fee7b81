//! Errors returned by every fallible operation in the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, PkiError>;

/// Represents errors that can occur while bootstrapping the authority or
/// managing certificates.
#[derive(Debug, Error)]
pub enum PkiError {
    /// The storage directory could not be created.
    #[error("Failed to create PKI storage directory {path}: {source}")]
    StorageDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a file under the storage directory failed.
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No certificate request with this ID.
    #[error("Certificate request {0} not found")]
    RequestNotFound(String),

    /// No certificate with this ID.
    #[error("Certificate {0} not found")]
    CertificateNotFound(String),

    /// A request with this ID has already been submitted.
    #[error("Certificate request {0} already exists")]
    RequestExists(String),

    /// A certificate is already stored under this ID.
    #[error("Certificate {0} already exists")]
    CertificateExists(String),

    /// The request has already been approved or rejected.
    #[error("Certificate request {0} is not pending")]
    RequestNotPending(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Error during key generation.
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// Error related to certificate operations.
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// Error from RSA operations.
    #[error("RSA error: {0}")]
    RsaError(String),

    /// Error from RSA PKCS1 operations.
    #[error("RSA PKCS1 error: {0}")]
    RsaPkcs1Error(String),

    /// The stored private key does not belong to the certificate.
    #[error("Private key does not match certificate {0}")]
    KeyMismatch(String),

    /// The rustls configuration could not be assembled.
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Registry snapshot (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A global wrapper was called before `global::initialize`.
    #[error("PKI manager not initialized")]
    NotInitialized,

    /// `global::initialize` was called twice.
    #[error("PKI manager already initialized")]
    AlreadyInitialized,
}

impl From<der::Error> for PkiError {
    /// Converts a `der::Error` into a `PkiError`.
    fn from(err: der::Error) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<pem::PemError> for PkiError {
    fn from(err: pem::PemError) -> Self {
        PkiError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for PkiError {
    fn from(err: rsa::Error) -> Self {
        PkiError::RsaError(err.to_string())
    }
}

impl From<rsa::pkcs1::Error> for PkiError {
    fn from(err: rsa::pkcs1::Error) -> Self {
        PkiError::RsaPkcs1Error(err.to_string())
    }
}

impl From<serde_json::Error> for PkiError {
    fn from(err: serde_json::Error) -> Self {
        PkiError::Serialization(err.to_string())
    }
}

impl From<rustls::Error> for PkiError {
    fn from(err: rustls::Error) -> Self {
        PkiError::Tls(err.to_string())
    }
}

use std::path::{Path, PathBuf};

use bon::Builder;
use serde::Deserialize;

use crate::cert::params::DistinguishedName;
use crate::error::{PkiError, Result};

/// Root key size used outside of tests.
pub const DEFAULT_ROOT_KEY_SIZE: usize = 4096;

/// Settings for [`PkiManager`](crate::PkiManager).
///
/// ```
/// use vaultpki::ManagerConfig;
///
/// let config = ManagerConfig::builder()
///     .storage_path("/var/lib/pki")
///     .root_key_size(2048)
///     .build();
/// assert!(!config.persist_registry);
/// ```
#[derive(Debug, Clone, Builder, Deserialize)]
pub struct ManagerConfig {
    /// Directory holding `root-ca.pem`, `root-ca-key.pem` and, when enabled,
    /// `registry.json`.
    #[builder(into)]
    pub storage_path: PathBuf,

    /// RSA modulus size for a freshly generated root.
    ///
    /// Defaults to 4096. Only this crate's own unit tests default to 2048;
    /// integration tests and downstream callers get 4096 unless they set it.
    #[builder(default = default_root_key_size())]
    #[serde(default = "default_root_key_size")]
    pub root_key_size: usize,

    #[builder(default = default_root_subject())]
    #[serde(default = "default_root_subject")]
    pub root_subject: DistinguishedName,

    #[builder(default = 10)]
    #[serde(default = "default_root_validity_years")]
    pub root_validity_years: i32,

    /// Validity of certificates minted by rotation.
    #[builder(default = 365)]
    #[serde(default = "default_rotation_validity_days")]
    pub rotation_validity_days: u32,

    /// Snapshot requests and certificates to disk after every change.
    #[builder(default)]
    #[serde(default)]
    pub persist_registry: bool,
}

impl ManagerConfig {
    /// Defaults for everything but the storage directory.
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self::builder().storage_path(storage_path).build()
    }

    /// Loads a JSON document; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PkiError::Io {
            action: "read config",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn default_root_key_size() -> usize {
    if cfg!(test) { 2048 } else { DEFAULT_ROOT_KEY_SIZE }
}

fn default_root_subject() -> DistinguishedName {
    DistinguishedName::builder()
        .organization("PeerVault Root CA".to_string())
        .locality("San Francisco".to_string())
        .country("US".to_string())
        .build()
}

fn default_root_validity_years() -> i32 {
    10
}

fn default_rotation_validity_days() -> u32 {
    365
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pki.json");
        std::fs::write(&path, r#"{"storage_path": "/tmp/pki", "persist_registry": true}"#).unwrap();

        let config = ManagerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.storage_path, PathBuf::from("/tmp/pki"));
        assert!(config.persist_registry);
        assert_eq!(config.root_key_size, 2048);
        assert_eq!(config.root_validity_years, 10);
        assert_eq!(config.rotation_validity_days, 365);
        assert_eq!(
            config.root_subject.organization.as_deref(),
            Some("PeerVault Root CA")
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ManagerConfig::from_json_file("/nonexistent/pki.json").unwrap_err();
        assert!(matches!(err, PkiError::Io { .. }));
    }
}

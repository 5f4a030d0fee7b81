//! JSON snapshot of the request and certificate registries.
//!
//! The snapshot is rewritten in full after each change: serialized to
//! `registry.json.tmp`, synced, then renamed over `registry.json`, so a crash
//! leaves either the old or the new snapshot. The file holds private keys
//! and is created 0600.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::authority::write_file;
use crate::error::{PkiError, Result};
use crate::model::{Certificate, CertificateRequest};

pub const REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub requests: Vec<CertificateRequest>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
}

impl Snapshot {
    pub fn from_maps(
        requests: &HashMap<String, CertificateRequest>,
        certificates: &HashMap<String, Certificate>,
    ) -> Self {
        let mut requests: Vec<_> = requests.values().cloned().collect();
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        let mut certificates: Vec<_> = certificates.values().cloned().collect();
        certificates.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            requests,
            certificates,
        }
    }
}

/// Snapshot file under a storage directory.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(REGISTRY_FILE),
        }
    }

    /// Reads the snapshot; an absent file is an empty registry.
    pub fn load(&self) -> Result<Snapshot> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(source) => {
                return Err(PkiError::Io {
                    action: "read registry snapshot",
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        info!(
            path = %self.path.display(),
            requests = snapshot.requests.len(),
            certificates = snapshot.certificates.len(),
            "loaded registry snapshot"
        );
        Ok(snapshot)
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        write_file(&tmp, &json, 0o600, "write registry snapshot")?;
        fs::rename(&tmp, &self.path).map_err(|source| PkiError::Io {
            action: "replace registry snapshot",
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), bytes = json.len(), "saved registry snapshot");
        Ok(())
    }
}

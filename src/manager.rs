use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rustls::RootCertStore;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::authority::{self, ROOT_CA_ID};
use crate::cert::extensions::AltName;
use crate::cert::{Certificate as X509Certificate, CertificateWithPrivateKey};
use crate::config::ManagerConfig;
use crate::error::{PkiError, Result};
use crate::issuance::issue_leaf;
use crate::model::{
    Certificate, CertificateAuthority, CertificateRequest, CertificateStatus, RequestStatus,
};
use crate::store::{RegistryStore, Snapshot};
use crate::tls::{self, TlsConfig};

/// Certificate authority and certificate lifecycle manager.
///
/// One lock guards the authority table and both registries. Every
/// operation that changes state, including issuance and the validity
/// check, holds it exclusively for its whole duration, so issuance is
/// serialized process-wide. Share the manager between threads with `Arc`.
#[derive(Debug)]
pub struct PkiManager {
    config: ManagerConfig,
    store: Option<RegistryStore>,
    state: RwLock<State>,
}

#[derive(Debug)]
struct State {
    cas: BTreeMap<String, CertificateAuthority>,
    root_signer: CertificateWithPrivateKey,
    registries: Registries,
}

#[derive(Debug, Clone, Default)]
struct Registries {
    requests: HashMap<String, CertificateRequest>,
    certificates: HashMap<String, Certificate>,
}

impl PkiManager {
    /// Bootstraps (or reloads) the root CA under `storage_path` with default settings.
    ///
    /// A new root gets a 4096-bit key. Use [`PkiManager::with_config`] with
    /// `root_key_size` set for a smaller key.
    pub fn new(storage_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(ManagerConfig::new(storage_path))
    }

    pub fn with_config(config: ManagerConfig) -> Result<Self> {
        let root = authority::bootstrap_root(&config)?;
        let root_signer = authority::signer(&root)?;

        let store = config
            .persist_registry
            .then(|| RegistryStore::new(&config.storage_path));

        let mut registries = Registries::default();
        if let Some(store) = &store {
            let snapshot = store.load()?;
            registries.requests = snapshot
                .requests
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect();
            registries.certificates = snapshot
                .certificates
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect();
        }

        let mut cas = BTreeMap::new();
        cas.insert(ROOT_CA_ID.to_string(), root);

        Ok(Self {
            config,
            store,
            state: RwLock::new(State {
                cas,
                root_signer,
                registries,
            }),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `change` against the registries. With persistence enabled the
    /// change is made on a copy that only replaces the live registries once
    /// the snapshot is on disk.
    fn apply<T>(
        &self,
        registries: &mut Registries,
        change: impl FnOnce(&mut Registries) -> Result<T>,
    ) -> Result<T> {
        let Some(store) = &self.store else {
            return change(registries);
        };
        let mut next = registries.clone();
        let out = change(&mut next)?;
        store.save(&Snapshot::from_maps(&next.requests, &next.certificates))?;
        *registries = next;
        Ok(out)
    }

    /// Validates and stores `request` as pending.
    ///
    /// `requested_at` is stamped now; any status or approval fields the
    /// caller filled in are reset.
    pub fn create_certificate_request(&self, mut request: CertificateRequest) -> Result<()> {
        request.validate()?;

        let mut state = self.write();
        self.apply(&mut state.registries, |reg| {
            if reg.requests.contains_key(&request.id) {
                return Err(PkiError::RequestExists(request.id.clone()));
            }
            if reg.certificates.contains_key(&request.id) {
                return Err(PkiError::CertificateExists(request.id.clone()));
            }
            request.requested_at = OffsetDateTime::now_utc();
            request.status = RequestStatus::Pending;
            request.approved_by = None;
            request.approved_at = None;

            info!(
                request_id = %request.id,
                subject = %request.subject,
                cert_type = %request.cert_type,
                requested_by = %request.requested_by,
                "created certificate request"
            );
            reg.requests.insert(request.id.clone(), request);
            Ok(())
        })
    }

    /// Issues the certificate for a pending request and marks it approved.
    ///
    /// The certificate is stored under the request's ID.
    #[instrument(skip(self))]
    pub fn approve_certificate_request(
        &self,
        request_id: &str,
        approved_by: &str,
    ) -> Result<Certificate> {
        let mut state = self.write();
        let State {
            root_signer,
            registries,
            ..
        } = &mut *state;

        self.apply(registries, |reg| {
            let request = reg
                .requests
                .get_mut(request_id)
                .ok_or_else(|| PkiError::RequestNotFound(request_id.to_string()))?;
            if request.status != RequestStatus::Pending {
                return Err(PkiError::RequestNotPending(request_id.to_string()));
            }
            if reg.certificates.contains_key(request_id) {
                return Err(PkiError::CertificateExists(request_id.to_string()));
            }

            let cert = issue_leaf(request, root_signer)?;

            request.status = RequestStatus::Approved;
            request.approved_by = Some(approved_by.to_string());
            request.approved_at = Some(OffsetDateTime::now_utc());

            info!(
                serial = %cert.serial_number,
                not_after = %cert.not_after,
                "approved certificate request"
            );
            reg.certificates.insert(cert.id.clone(), cert.clone());
            Ok(cert)
        })
    }

    /// Moves a pending request to `rejected`. No certificate is issued.
    #[instrument(skip(self))]
    pub fn reject_certificate_request(&self, request_id: &str, rejected_by: &str) -> Result<()> {
        let mut state = self.write();
        self.apply(&mut state.registries, |reg| {
            let request = reg
                .requests
                .get_mut(request_id)
                .ok_or_else(|| PkiError::RequestNotFound(request_id.to_string()))?;
            if request.status != RequestStatus::Pending {
                return Err(PkiError::RequestNotPending(request_id.to_string()));
            }

            request.status = RequestStatus::Rejected;
            request
                .metadata
                .insert("rejected_by".to_string(), rejected_by.into());
            request.metadata.insert(
                "rejected_at".to_string(),
                OffsetDateTime::now_utc().unix_timestamp().into(),
            );
            info!("rejected certificate request");
            Ok(())
        })
    }

    pub fn get_certificate_request(&self, request_id: &str) -> Option<CertificateRequest> {
        self.read().registries.requests.get(request_id).cloned()
    }

    /// All requests, ordered by ID.
    pub fn list_certificate_requests(&self) -> Vec<CertificateRequest> {
        let mut requests: Vec<_> = self.read().registries.requests.values().cloned().collect();
        requests.sort_by(|a, b| a.id.cmp(&b.id));
        requests
    }

    pub fn get_certificate(&self, cert_id: &str) -> Option<Certificate> {
        let cert = self.read().registries.certificates.get(cert_id).cloned();
        debug!(cert_id, found = cert.is_some(), "certificate lookup");
        cert
    }

    /// All issued certificates, ordered by ID.
    pub fn list_certificates(&self) -> Vec<Certificate> {
        let mut certs: Vec<_> = self
            .read()
            .registries
            .certificates
            .values()
            .cloned()
            .collect();
        certs.sort_by(|a, b| a.id.cmp(&b.id));
        certs
    }

    /// Marks a certificate revoked. The reason is kept in its metadata;
    /// nothing is published to relying parties.
    #[instrument(skip(self))]
    pub fn revoke_certificate(&self, cert_id: &str, reason: &str) -> Result<()> {
        let mut state = self.write();
        self.apply(&mut state.registries, |reg| {
            let cert = reg
                .certificates
                .get_mut(cert_id)
                .ok_or_else(|| PkiError::CertificateNotFound(cert_id.to_string()))?;
            mark_revoked(cert, reason);
            info!(serial = %cert.serial_number, "revoked certificate");
            Ok(())
        })
    }

    /// Sets the status of a certificate outside its validity window to
    /// `expired` and returns the resulting status. Revoked certificates
    /// stay revoked.
    pub fn refresh_expiry(&self, cert_id: &str) -> Result<CertificateStatus> {
        let mut state = self.write();
        self.refresh_expiry_locked(&mut state.registries, cert_id)
    }

    fn refresh_expiry_locked(
        &self,
        registries: &mut Registries,
        cert_id: &str,
    ) -> Result<CertificateStatus> {
        let now = OffsetDateTime::now_utc();
        let cert = registries
            .certificates
            .get(cert_id)
            .ok_or_else(|| PkiError::CertificateNotFound(cert_id.to_string()))?;

        let flips = !cert.within_window(now)
            && !matches!(
                cert.status,
                CertificateStatus::Expired | CertificateStatus::Revoked
            );
        if !flips {
            return Ok(cert.status);
        }

        self.apply(registries, |reg| {
            let cert = reg
                .certificates
                .get_mut(cert_id)
                .ok_or_else(|| PkiError::CertificateNotFound(cert_id.to_string()))?;
            cert.status = CertificateStatus::Expired;
            cert.updated_at = now;
            warn!(
                cert_id,
                not_before = %cert.not_before,
                not_after = %cert.not_after,
                "certificate outside its validity window, marked expired"
            );
            Ok(cert.status)
        })
    }

    /// `true` iff the certificate is `valid` and now lies within
    /// `[not_before, not_after]`. A certificate found outside its window is
    /// marked `expired` as part of the check.
    pub fn check_certificate_validity(&self, cert_id: &str) -> Result<bool> {
        let mut state = self.write();
        let status = self.refresh_expiry_locked(&mut state.registries, cert_id)?;
        let valid = status == CertificateStatus::Valid
            && state.registries.certificates[cert_id].within_window(OffsetDateTime::now_utc());
        debug!(cert_id, %status, valid, "checked certificate validity");
        Ok(valid)
    }

    /// TLS material for an issued certificate, minimum version TLS 1.2.
    pub fn tls_config(&self, cert_id: &str) -> Result<TlsConfig> {
        let cert = self
            .get_certificate(cert_id)
            .ok_or_else(|| PkiError::CertificateNotFound(cert_id.to_string()))?;
        TlsConfig::from_certificate(&cert)
    }

    /// Issues a replacement for `cert_id` with the same type, common name,
    /// key size and alternative names, then revokes the original.
    ///
    /// The replacement's ID is `<cert_id>-rotated-<unix seconds>`, with a
    /// numeric suffix if that ID is taken.
    #[instrument(skip(self))]
    pub fn rotate_certificate(&self, cert_id: &str) -> Result<Certificate> {
        let mut state = self.write();
        let State {
            root_signer,
            registries,
            ..
        } = &mut *state;

        self.apply(registries, |reg| {
            let old = reg
                .certificates
                .get(cert_id)
                .ok_or_else(|| PkiError::CertificateNotFound(cert_id.to_string()))?;

            let new_id = rotated_id(cert_id, |id| {
                reg.certificates.contains_key(id) || reg.requests.contains_key(id)
            });
            let request = self.rotation_request(old, new_id)?;
            let mut new_cert = issue_leaf(&request, root_signer)?;
            new_cert
                .metadata
                .insert("rotated_from".to_string(), cert_id.into());

            if let Some(old) = reg.certificates.get_mut(cert_id) {
                mark_revoked(old, "rotated");
                old.metadata
                    .insert("rotated_to".to_string(), new_cert.id.clone().into());
            }

            info!(new_id = %new_cert.id, serial = %new_cert.serial_number, "rotated certificate");
            reg.certificates.insert(new_cert.id.clone(), new_cert.clone());
            Ok(new_cert)
        })
    }

    fn rotation_request(&self, old: &Certificate, new_id: String) -> Result<CertificateRequest> {
        let parsed = X509Certificate::from_pem(&old.pem_data)?;
        let subject = parsed
            .common_name()
            .unwrap_or_else(|| old.subject.clone());

        let mut dns_names = Vec::new();
        let mut email_addresses = Vec::new();
        let mut ip_addresses = Vec::new();
        for name in parsed.subject_alt_names()? {
            match name {
                AltName::Dns(dns) => dns_names.push(dns),
                AltName::Email(email) => email_addresses.push(email),
                AltName::Ip(ip) => ip_addresses.push(ip.to_string()),
            }
        }

        Ok(CertificateRequest::builder()
            .id(new_id)
            .cert_type(old.cert_type)
            .subject(subject)
            .dns_names(dns_names)
            .email_addresses(email_addresses)
            .ip_addresses(ip_addresses)
            .key_size(old.key_size)
            .algorithm(old.algorithm)
            .validity_days(self.config.rotation_validity_days)
            .build())
    }

    pub fn get_certificate_authority(&self, ca_id: &str) -> Option<CertificateAuthority> {
        self.read().cas.get(ca_id).cloned()
    }

    /// All authorities, ordered by ID.
    pub fn list_certificate_authorities(&self) -> Vec<CertificateAuthority> {
        self.read().cas.values().cloned().collect()
    }

    /// PEM of the root CA certificate, for relying parties.
    pub fn root_certificate_pem(&self) -> String {
        self.read().cas[ROOT_CA_ID].certificate.pem_data.clone()
    }

    /// A rustls trust store holding the root CA.
    pub fn root_store(&self) -> Result<RootCertStore> {
        tls::root_store(&self.root_certificate_pem())
    }
}

fn mark_revoked(cert: &mut Certificate, reason: &str) {
    cert.status = CertificateStatus::Revoked;
    cert.updated_at = OffsetDateTime::now_utc();
    cert.metadata
        .insert("revocation_reason".to_string(), reason.into());
}

fn rotated_id(cert_id: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = format!(
        "{cert_id}-rotated-{}",
        OffsetDateTime::now_utc().unix_timestamp()
    );
    if !taken(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{base}-{n}"))
        .find(|id| !taken(id))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CertificateType;
    use time::Duration;

    fn manager(dir: &std::path::Path) -> PkiManager {
        PkiManager::with_config(
            ManagerConfig::builder()
                .storage_path(dir)
                .root_key_size(2048)
                .build(),
        )
        .unwrap()
    }

    fn issue(manager: &PkiManager, id: &str) -> Certificate {
        manager
            .create_certificate_request(
                CertificateRequest::builder()
                    .id(id)
                    .cert_type(CertificateType::Server)
                    .subject(format!("{id}.internal"))
                    .build(),
            )
            .unwrap();
        manager.approve_certificate_request(id, "admin").unwrap()
    }

    fn backdate(manager: &PkiManager, id: &str) {
        let mut state = manager.write();
        let cert = state.registries.certificates.get_mut(id).unwrap();
        cert.not_before -= Duration::days(30);
        cert.not_after = OffsetDateTime::now_utc() - Duration::days(1);
    }

    #[test]
    fn test_expired_certificate_flips_once() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        issue(&manager, "old");
        backdate(&manager, "old");

        assert!(!manager.check_certificate_validity("old").unwrap());
        let expired = manager.get_certificate("old").unwrap();
        assert_eq!(expired.status, CertificateStatus::Expired);

        assert!(!manager.check_certificate_validity("old").unwrap());
        assert_eq!(
            manager.get_certificate("old").unwrap().updated_at,
            expired.updated_at
        );
    }

    #[test]
    fn test_expiry_does_not_overwrite_revocation() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        issue(&manager, "gone");
        manager.revoke_certificate("gone", "key compromise").unwrap();
        backdate(&manager, "gone");

        assert_eq!(
            manager.refresh_expiry("gone").unwrap(),
            CertificateStatus::Revoked
        );
        assert!(!manager.check_certificate_validity("gone").unwrap());
    }

    #[test]
    fn test_not_yet_valid_is_outside_window() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        issue(&manager, "future");
        {
            let mut state = manager.write();
            let cert = state.registries.certificates.get_mut("future").unwrap();
            cert.not_before = OffsetDateTime::now_utc() + Duration::days(1);
        }
        assert!(!manager.check_certificate_validity("future").unwrap());
        assert_eq!(
            manager.get_certificate("future").unwrap().status,
            CertificateStatus::Expired
        );
    }

    #[test]
    fn test_out_of_range_validity_fails_approval() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let request = CertificateRequest::builder()
            .id("long")
            .cert_type(CertificateType::Server)
            .subject("long.internal")
            .validity_days(3_000_000)
            .build();
        assert!(matches!(
            manager.create_certificate_request(request.clone()),
            Err(PkiError::InvalidInput(_))
        ));

        // a snapshot written by hand can still carry one
        manager
            .write()
            .registries
            .requests
            .insert(request.id.clone(), request);
        assert!(matches!(
            manager.approve_certificate_request("long", "admin"),
            Err(PkiError::InvalidInput(_))
        ));
        assert_eq!(
            manager.get_certificate_request("long").unwrap().status,
            RequestStatus::Pending
        );
        assert!(manager.get_certificate("long").is_none());

        // the lock is still usable
        issue(&manager, "after");
    }

    #[test]
    fn test_approval_never_replaces_a_stored_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let existing = issue(&manager, "taken");
        manager.revoke_certificate("taken", "compromised").unwrap();

        // a pending request under the same ID, as a restored snapshot could hold
        let request = CertificateRequest::builder()
            .id("taken")
            .cert_type(CertificateType::Server)
            .subject("evil.local")
            .build();
        manager
            .write()
            .registries
            .requests
            .insert(request.id.clone(), request);

        assert!(matches!(
            manager.approve_certificate_request("taken", "admin"),
            Err(PkiError::CertificateExists(_))
        ));
        let stored = manager.get_certificate("taken").unwrap();
        assert_eq!(stored.status, CertificateStatus::Revoked);
        assert_eq!(stored.serial_number, existing.serial_number);
        assert_eq!(
            manager.get_certificate_request("taken").unwrap().status,
            RequestStatus::Pending
        );
    }

    #[test]
    fn test_rotated_id_avoids_collisions() {
        let base = rotated_id("svc", |_| false);
        assert!(base.starts_with("svc-rotated-"));

        let taken = base.clone();
        let next = rotated_id("svc", |id| id == taken);
        assert_eq!(next, format!("{base}-1"));
    }
}

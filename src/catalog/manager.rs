use super::hash::{acl_owner, apl_rdata, catalog_hash, member_owner};
use crate::domain::{Domain, DomainStore};
use crate::error::CatalogError;
use crate::fsutil::{wait_for_mtime_in_past, write_atomic_async};
use crate::jobs::{CatalogChange, Job, JobQueue, ZoneChange};
use crate::lock::FileLock;
use crate::resolve::{ResolverCache, transfer_addresses};
use crate::zone::{
    RecordData, RecordType, Soa, ZoneDocument, ZoneParser, absolute_name, increment_serial,
    render,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What an update did to the catalog file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOutcome {
    /// The file was rewritten with this serial
    Written { serial: u32 },
    /// The member's entries were already current; nothing was written
    Unchanged,
}

/// Owner of the single catalog zone file shared by all domains.
///
/// Every mutation runs under an exclusive lock on the sidecar lock file:
/// parse, mutate, write, release.
pub struct CatalogManager {
    path: PathBuf,
    zone: String,
    slave_ips: Vec<IpAddr>,
    resolver: Arc<ResolverCache>,
    store: Arc<dyn DomainStore>,
    queue: Arc<dyn JobQueue>,
}

/// Member entries of one domain
#[derive(Debug, PartialEq)]
struct MemberEntries {
    ptr: Vec<String>,
    apl: Vec<String>,
}

impl CatalogManager {
    pub fn new(
        path: impl Into<PathBuf>,
        zone: &str,
        slave_ips: Vec<IpAddr>,
        resolver: Arc<ResolverCache>,
        store: Arc<dyn DomainStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            path: path.into(),
            zone: absolute_name(zone),
            slave_ips,
            resolver,
            store,
            queue,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Empty catalog: zero serial, placeholder NS and the schema version
    pub fn bootstrap_document(&self) -> ZoneDocument {
        let soa = Soa {
            primary_ns: "invalid.".to_string(),
            hostmaster: "invalid.".to_string(),
            serial: 0,
            refresh: 3600,
            retry: 600,
            expire: 2_419_200,
            minimum: 3600,
            ttl: 3600,
        };
        let mut document = ZoneDocument::new(&self.zone, soa);
        let ttl = document.default_ttl;
        // Neither call can fail: the types are not SOA
        let _ = document.set("", RecordType::NS, vec![RecordData::new("invalid.", ttl)]);
        let _ = document.set(
            "version",
            RecordType::TXT,
            vec![RecordData::new("\"2\"", ttl)],
        );
        document
    }

    async fn load(&self) -> Result<ZoneDocument, CatalogError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Catalog {} missing, bootstrapping", self.path.display());
                return Ok(self.bootstrap_document());
            }
            Err(e) => return Err(CatalogError::io(&self.path, e)),
        };
        Ok(ZoneParser::with_origin(&self.zone).parse(&text)?)
    }

    async fn lock(&self) -> Result<FileLock, CatalogError> {
        FileLock::acquire(&self.path)
            .await
            .map_err(|e| CatalogError::Lock {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Entries the catalog should hold for a member domain
    async fn member_entries(&self, domain: &Domain) -> MemberEntries {
        let addresses = transfer_addresses(domain, &self.resolver, &self.slave_ips).await;
        MemberEntries {
            ptr: vec![domain.origin()],
            apl: apl_rdata(&addresses).into_iter().collect(),
        }
    }

    fn take_entries(document: &mut ZoneDocument, hash: &str) -> MemberEntries {
        let contents = |records: Option<Vec<RecordData>>| -> Vec<String> {
            records
                .unwrap_or_default()
                .into_iter()
                .map(|r| r.content)
                .collect()
        };
        MemberEntries {
            ptr: contents(document.unset(&member_owner(hash), RecordType::PTR)),
            apl: contents(document.unset(&acl_owner(hash), RecordType::APL)),
        }
    }

    fn put_entries(document: &mut ZoneDocument, hash: &str, entries: &MemberEntries) {
        let ttl = document.default_ttl;
        let records = |values: &[String]| -> Vec<RecordData> {
            values.iter().map(|v| RecordData::new(v.as_str(), ttl)).collect()
        };
        // PTR and APL are never SOA, so set cannot fail
        let _ = document.set(&member_owner(hash), RecordType::PTR, records(&entries.ptr));
        let _ = document.set(&acl_owner(hash), RecordType::APL, records(&entries.apl));
    }

    /// Add, refresh or remove one member.
    ///
    /// `change` is a no-op when the member's PTR and APL are already
    /// current. When `change` alters a member's allow-transfer list the
    /// member zone is re-added so its own ACL follows.
    pub async fn update(
        &self,
        domain_name: &str,
        mode: CatalogChange,
    ) -> Result<CatalogOutcome, CatalogError> {
        let domain_name = absolute_name(domain_name);
        let hash = catalog_hash(&domain_name)?;
        let _lock = self.lock().await?;

        let mut document = self.load().await?;
        document.soa.serial = increment_serial(document.soa.serial);

        let previous = Self::take_entries(&mut document, &hash);

        let mut current = None;
        if mode != CatalogChange::Remove {
            match self.store.load(&domain_name).await? {
                Some(domain) if domain.has_ns() => {
                    let entries = self.member_entries(&domain).await;
                    Self::put_entries(&mut document, &hash, &entries);
                    current = Some(entries);
                }
                Some(_) => warn!("{} has no NS records, leaving it out of the catalog", domain_name),
                None => warn!("{} not found, removing it from the catalog", domain_name),
            }
        }

        let acl_changed = current
            .as_ref()
            .is_some_and(|entries| !previous.ptr.is_empty() && entries.apl != previous.apl);
        let absent = MemberEntries {
            ptr: Vec::new(),
            apl: Vec::new(),
        };
        if mode == CatalogChange::Change && current.as_ref().unwrap_or(&absent) == &previous {
            debug!("Catalog entry of {} unchanged", domain_name);
            return Ok(CatalogOutcome::Unchanged);
        }

        let serial = document.soa.serial;
        self.write(&document).await?;
        info!(
            "Catalog {} {} {} (serial {})",
            self.zone,
            mode.as_str(),
            domain_name,
            serial
        );

        self.schedule_reload().await?;
        if mode == CatalogChange::Change && acl_changed {
            self.queue
                .enqueue(Job::ZoneChanged {
                    domain: domain_name,
                    change: ZoneChange::Readd,
                    filename: None,
                    no_catalog: true,
                })
                .await?;
        }

        Ok(CatalogOutcome::Written { serial })
    }

    /// Regenerate the whole member list from the store in one write
    pub async fn rebuild(&self) -> Result<usize, CatalogError> {
        let names = self.store.list().await?;
        let _lock = self.lock().await?;

        let previous_serial = match self.load().await {
            Ok(document) => document.soa.serial,
            Err(e) => {
                warn!("Discarding unreadable catalog {}: {}", self.path.display(), e);
                0
            }
        };
        let mut document = self.bootstrap_document();
        document.soa.serial = increment_serial(previous_serial);

        let mut members = 0;
        for name in names {
            let Some(domain) = self.store.load(&name).await? else {
                continue;
            };
            if !domain.has_ns() {
                continue;
            }
            let hash = match catalog_hash(&domain.origin()) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Leaving {} out of the catalog: {}", domain.name, e);
                    continue;
                }
            };
            let entries = self.member_entries(&domain).await;
            Self::put_entries(&mut document, &hash, &entries);
            members += 1;
        }

        self.write(&document).await?;
        info!(
            "Rebuilt catalog {} with {} members (serial {})",
            self.zone, members, document.soa.serial
        );
        self.schedule_reload().await?;
        Ok(members)
    }

    async fn write(&self, document: &ZoneDocument) -> Result<(), CatalogError> {
        // A rewrite within the same second as the last one would not look
        // newer to the name server
        wait_for_mtime_in_past(&self.path)
            .await
            .map_err(|e| CatalogError::io(&self.path, e))?;
        write_atomic_async(self.path.clone(), render(document).into_bytes())
            .await
            .map_err(|e| CatalogError::io(&self.path, e))
    }

    async fn schedule_reload(&self) -> Result<(), CatalogError> {
        self.queue
            .enqueue(Job::ZoneChanged {
                domain: self.zone.clone(),
                change: ZoneChange::Change,
                filename: Some(self.path.clone()),
                no_catalog: true,
            })
            .await?;
        Ok(())
    }
}

use crate::command::{ZoneCommands, format_acl};
use crate::dnssec::KeyProvisioner;
use crate::domain::{Domain, DomainStore};
use crate::error::DeployError;
use crate::fsutil::{remove_if_exists, wait_for_mtime_in_past, write_atomic_async};
use crate::jobs::{CatalogChange, Job, JobQueue, ZoneChange};
use crate::lock::FileLock;
use crate::resolve::{ResolverCache, transfer_addresses};
use crate::zone::{
    ZoneDocument, ZoneParser, absolute_name, next_serial, read_content_hash, render,
    scan_soa_serial,
};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Files the name server writes next to a zone
const ZONE_ARTIFACTS: &[&str] = &["jnl", "jbk", "signed", "signed.jnl"];

/// How a deploy was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployOptions {
    pub change: ZoneChange,
    /// Do not schedule a catalog update afterwards
    pub no_catalog: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            change: ZoneChange::Change,
            no_catalog: false,
        }
    }
}

/// What a deploy did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The zone file was written and the server told to load it
    Written { path: PathBuf, serial: u32 },
    /// The file already carried the same content hash
    Unchanged { path: PathBuf },
    /// The zone has no apex NS and is not served; `removed` tells whether a
    /// previously deployed zone was taken down
    NotServable { removed: bool },
}

/// Writes zone files and drives the name server for one domain at a time.
///
/// Deploys of the same domain are serialized by the zone's lock file;
/// different domains proceed in parallel.
pub struct ZoneDeployer {
    zone_dir: PathBuf,
    commands: ZoneCommands,
    resolver: Arc<ResolverCache>,
    slave_ips: Vec<IpAddr>,
    store: Arc<dyn DomainStore>,
    queue: Arc<dyn JobQueue>,
    keys: Option<Arc<KeyProvisioner>>,
}

impl ZoneDeployer {
    pub fn new(
        zone_dir: impl Into<PathBuf>,
        commands: ZoneCommands,
        resolver: Arc<ResolverCache>,
        slave_ips: Vec<IpAddr>,
        store: Arc<dyn DomainStore>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            zone_dir: zone_dir.into(),
            commands,
            resolver,
            slave_ips,
            store,
            queue,
            keys: None,
        }
    }

    /// Reconcile DNSSEC key files after each deploy
    pub fn with_keys(mut self, keys: Arc<KeyProvisioner>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// `{zone_dir}/{domain}.db`
    pub fn zone_path(&self, domain: &str) -> PathBuf {
        self.zone_dir
            .join(format!("{}.db", absolute_name(domain).trim_end_matches('.')))
    }

    async fn lock(&self, path: &Path) -> Result<FileLock, DeployError> {
        FileLock::acquire(path)
            .await
            .map_err(|e| DeployError::Lock {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }

    /// Serial and content hash of the currently deployed file, `None` when
    /// there is none.
    ///
    /// A file that no longer parses still yields its serial when the SOA can
    /// be picked out of it, so the next serial keeps increasing; without one
    /// the deploy fails rather than restart the serial sequence.
    async fn existing_state(
        &self,
        path: &Path,
        origin: &str,
    ) -> Result<Option<(u32, Option<String>)>, DeployError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DeployError::io(path, e)),
        };
        let text = String::from_utf8_lossy(&bytes);
        match ZoneParser::with_origin(origin).parse(&text) {
            Ok(document) => Ok(Some((document.soa.serial, read_content_hash(&text)))),
            Err(e) => match scan_soa_serial(&text) {
                Some(serial) => {
                    warn!(
                        "Existing zone file {} unreadable ({}), continuing from serial {}",
                        path.display(),
                        e,
                        serial
                    );
                    Ok(Some((serial, None)))
                }
                None => Err(DeployError::Zone(e)),
            },
        }
    }

    /// Delete a zone file and the server's artifacts next to it
    fn remove_zone_files(path: &Path) -> Result<bool, DeployError> {
        let removed = remove_if_exists(path).map_err(|e| DeployError::io(path, e))?;
        for extension in ZONE_ARTIFACTS {
            let mut artifact = path.as_os_str().to_os_string();
            artifact.push(".");
            artifact.push(extension);
            let artifact = PathBuf::from(artifact);
            if remove_if_exists(&artifact).map_err(|e| DeployError::io(&artifact, e))? {
                debug!("Removed {}", artifact.display());
            }
        }
        Ok(removed)
    }

    /// Write and (re)load a domain's zone.
    ///
    /// Only zones with an enabled apex NS are served. A zone that lost its
    /// NS records is taken down if it had been deployed before.
    pub async fn deploy(
        &self,
        domain: &Domain,
        options: DeployOptions,
    ) -> Result<DeployOutcome, DeployError> {
        let origin = domain.origin();
        let path = self.zone_path(&origin);

        if !domain.has_ns() {
            return self.take_down(domain, &path, options).await;
        }

        let lock = self.lock(&path).await?;

        let existing = self.existing_state(&path, &origin).await?;
        let existed = existing.is_some();
        let previous_serial = existing
            .as_ref()
            .map_or(0, |(serial, _)| *serial)
            .max(domain.soa.serial);

        let document = domain.to_document(next_serial(previous_serial));
        let hash = document.content_hash();
        let unchanged = existing
            .as_ref()
            .and_then(|(_, existing_hash)| existing_hash.as_deref())
            .is_some_and(|existing_hash| existing_hash == hash);

        if unchanged && options.change != ZoneChange::Readd {
            drop(lock);
            debug!("Zone {} unchanged ({})", origin, hash);
            self.reconcile_keys(domain).await?;
            return Ok(DeployOutcome::Unchanged { path });
        }

        self.write_zone(&path, &document).await?;
        let serial = document.soa.serial;
        info!("Wrote zone {} serial {} to {}", origin, serial, path.display());

        let bare = domain.bare_name();
        if !existed || options.change == ZoneChange::Readd {
            if options.change == ZoneChange::Readd && existed {
                self.commands.delete(&bare).await;
            }
            let addresses = transfer_addresses(domain, &self.resolver, &self.slave_ips).await;
            self.commands.add(&bare, &path, &format_acl(&addresses)).await;
        } else {
            self.commands.reload(&bare, &path).await;
        }
        drop(lock);

        self.reconcile_keys(domain).await?;

        if !options.no_catalog {
            let change = if existed {
                CatalogChange::Change
            } else {
                CatalogChange::Add
            };
            self.queue
                .enqueue(Job::UpdateCatalog {
                    domain: origin,
                    change,
                })
                .await?;
        }

        Ok(DeployOutcome::Written { path, serial })
    }

    async fn write_zone(&self, path: &Path, document: &ZoneDocument) -> Result<(), DeployError> {
        wait_for_mtime_in_past(path)
            .await
            .map_err(|e| DeployError::io(path, e))?;
        write_atomic_async(path.to_path_buf(), render(document).into_bytes())
            .await
            .map_err(|e| DeployError::io(path, e))
    }

    async fn take_down(
        &self,
        domain: &Domain,
        path: &Path,
        options: DeployOptions,
    ) -> Result<DeployOutcome, DeployError> {
        let lock = self.lock(path).await?;
        let removed = Self::remove_zone_files(path)?;
        drop(lock);

        if !removed {
            debug!("{} has no NS records, not deploying", domain.name);
            return Ok(DeployOutcome::NotServable { removed: false });
        }

        info!("{} lost its NS records, removing zone", domain.name);
        self.commands.delete(&domain.bare_name()).await;
        if !options.no_catalog {
            self.queue
                .enqueue(Job::UpdateCatalog {
                    domain: domain.origin(),
                    change: CatalogChange::Remove,
                })
                .await?;
        }
        Ok(DeployOutcome::NotServable { removed: true })
    }

    async fn reconcile_keys(&self, domain: &Domain) -> Result<(), DeployError> {
        match &self.keys {
            Some(keys) if domain.dnssec => {
                keys.materialize_keys(domain).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Remove a domain's zone, artifacts and key files and tell the server
    /// to drop it
    pub async fn remove(&self, domain_name: &str, no_catalog: bool) -> Result<(), DeployError> {
        let origin = absolute_name(domain_name);
        let path = self.zone_path(&origin);

        let lock = self.lock(&path).await?;
        let removed = Self::remove_zone_files(&path)?;
        drop(lock);

        let bare = origin.trim_end_matches('.');
        self.commands.delete(bare).await;
        if let Some(keys) = &self.keys {
            keys.purge_key_files(&origin).await?;
        }
        info!("Removed zone {} (file present: {})", origin, removed);

        if !no_catalog {
            self.queue
                .enqueue(Job::UpdateCatalog {
                    domain: origin,
                    change: CatalogChange::Remove,
                })
                .await?;
        }
        Ok(())
    }

    /// Move a zone to a new name: the old name's files are removed before
    /// the new one is deployed
    pub async fn rename(
        &self,
        old_name: &str,
        domain: &Domain,
    ) -> Result<DeployOutcome, DeployError> {
        self.remove(old_name, false).await?;
        self.deploy(
            domain,
            DeployOptions {
                change: ZoneChange::Add,
                no_catalog: false,
            },
        )
        .await
    }

    /// Drive the server for a zone given only by file, without deploying
    /// from the store. Used for the catalog zone.
    pub async fn reload_file(&self, zone: &str, file: &Path, change: ZoneChange) {
        let bare = absolute_name(zone).trim_end_matches('.').to_string();
        match change {
            ZoneChange::Change => {
                self.commands.reload(&bare, file).await;
            }
            ZoneChange::Add => {
                self.commands
                    .add(&bare, file, &format_acl(&self.slave_ips))
                    .await;
            }
            ZoneChange::Readd => {
                self.commands.delete(&bare).await;
                self.commands
                    .add(&bare, file, &format_acl(&self.slave_ips))
                    .await;
            }
            ZoneChange::Remove => {
                self.commands.delete(&bare).await;
            }
        }
    }

    /// Look a domain up and deploy it; unknown domains are removed
    pub async fn deploy_by_name(
        &self,
        name: &str,
        options: DeployOptions,
    ) -> Result<DeployOutcome, DeployError> {
        match self.store.load(name).await? {
            Some(domain) => self.deploy(&domain, options).await,
            None => {
                warn!("{} not found in store, removing", name);
                self.remove(name, options.no_catalog).await?;
                Ok(DeployOutcome::NotServable { removed: true })
            }
        }
    }
}

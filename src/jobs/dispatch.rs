use super::{Job, JobQueue, ZoneChange};
use crate::catalog::CatalogManager;
use crate::deploy::{DeployOptions, ZoneDeployer};
use crate::dnssec::KeyProvisioner;
use crate::domain::DomainStore;
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routes each job to the component that handles it
pub struct Dispatcher {
    store: Arc<dyn DomainStore>,
    queue: Arc<dyn JobQueue>,
    deployer: Arc<ZoneDeployer>,
    catalog: Arc<CatalogManager>,
    keys: Option<Arc<KeyProvisioner>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn DomainStore>,
        queue: Arc<dyn JobQueue>,
        deployer: Arc<ZoneDeployer>,
        catalog: Arc<CatalogManager>,
        keys: Option<Arc<KeyProvisioner>>,
    ) -> Self {
        Self {
            store,
            queue,
            deployer,
            catalog,
            keys,
        }
    }

    /// Execute one job. An error leaves the job unacknowledged so that the
    /// queue redelivers it.
    pub async fn dispatch(&self, job: &Job) -> Result<()> {
        debug!("Dispatching {}", job);
        match job {
            Job::AddDomain { domain } => {
                let options = DeployOptions {
                    change: ZoneChange::Add,
                    no_catalog: false,
                };
                self.deployer.deploy_by_name(domain, options).await?;
            }
            Job::DeleteDomain { domain } => {
                self.deployer.remove(domain, false).await?;
            }
            Job::RenameDomain { old_name, domain } => match self.store.load(domain).await? {
                Some(domain) => {
                    self.deployer.rename(old_name, &domain).await?;
                }
                None => {
                    warn!("Rename target {} not found, removing {}", domain, old_name);
                    self.deployer.remove(old_name, false).await?;
                }
            },
            Job::ZoneChanged {
                domain,
                change,
                filename,
                no_catalog,
            } => match (filename, change) {
                (Some(file), _) => self.deployer.reload_file(domain, file, *change).await,
                (None, ZoneChange::Remove) => self.deployer.remove(domain, *no_catalog).await?,
                (None, _) => {
                    let options = DeployOptions {
                        change: *change,
                        no_catalog: *no_catalog,
                    };
                    self.deployer.deploy_by_name(domain, options).await?;
                }
            },
            Job::UpdateCatalog { domain, change } => {
                self.catalog.update(domain, *change).await?;
            }
            Job::CreateKeys { domain } => self.create_keys(domain).await?,
            Job::RebuildZones => {
                let names = self.store.list().await?;
                info!("Rebuilding {} zones", names.len());
                for name in names {
                    self.queue
                        .enqueue(Job::ZoneChanged {
                            domain: name,
                            change: ZoneChange::Readd,
                            filename: None,
                            no_catalog: true,
                        })
                        .await?;
                }
                self.queue.enqueue(Job::RebuildCatalog).await?;
            }
            Job::RebuildCatalog => {
                self.catalog.rebuild().await?;
            }
        }
        Ok(())
    }

    async fn create_keys(&self, domain: &str) -> Result<()> {
        let Some(keys) = &self.keys else {
            warn!("DNSSEC disabled, not creating keys for {}", domain);
            return Ok(());
        };
        // A redelivered job must not create a second key set
        if !self.store.keys(domain).await?.is_empty() {
            debug!("{} already has keys", domain);
            return Ok(());
        }
        keys.create_default_keys(domain).await?;
        Ok(())
    }
}

//! Wiring of the components around one configuration.

use crate::catalog::CatalogManager;
use crate::command::{CommandRunner, ZoneCommands};
use crate::config::SyncConfig;
use crate::deploy::ZoneDeployer;
use crate::dnssec::{DnssecTooling, KeyPolicy, KeyProvisioner};
use crate::domain::DomainStore;
use crate::jobs::{Dispatcher, JobQueue, LocalJobQueue, WorkerPool};
use crate::resolve::{HostResolver, ResolverCache};
use std::sync::Arc;
use tracing::info;

/// Everything a worker needs, built once at startup
pub struct SyncContext {
    pub config: SyncConfig,
    pub queue: LocalJobQueue,
    pub store: Arc<dyn DomainStore>,
    pub resolver: Arc<ResolverCache>,
    pub deployer: Arc<ZoneDeployer>,
    pub catalog: Arc<CatalogManager>,
    pub keys: Option<Arc<KeyProvisioner>>,
    pub dispatcher: Arc<Dispatcher>,
}

impl SyncContext {
    pub fn build(
        config: SyncConfig,
        store: Arc<dyn DomainStore>,
        runner: Arc<dyn CommandRunner>,
        resolver: Arc<dyn HostResolver>,
        tools: Arc<dyn DnssecTooling>,
        queue: LocalJobQueue,
    ) -> Self {
        let shared_queue: Arc<dyn JobQueue> = Arc::new(queue.clone());
        let resolver = Arc::new(ResolverCache::new(resolver, config.resolver_ttl()));

        let keys = config.dnssec_enabled.then(|| {
            Arc::new(KeyProvisioner::new(
                tools,
                store.clone(),
                shared_queue.clone(),
                config.key_dir.clone(),
                KeyPolicy {
                    algorithm: config.key_algorithm.clone(),
                    ksk_size: config.ksk_size,
                    zsk_size: config.zsk_size,
                },
            ))
        });

        let mut deployer = ZoneDeployer::new(
            config.zone_dir.clone(),
            ZoneCommands::new(&config.commands, runner),
            resolver.clone(),
            config.slave_ips.clone(),
            store.clone(),
            shared_queue.clone(),
        );
        if let Some(keys) = &keys {
            deployer = deployer.with_keys(keys.clone());
        }
        let deployer = Arc::new(deployer);

        let catalog = Arc::new(CatalogManager::new(
            config.catalog_path.clone(),
            &config.catalog_zone,
            config.slave_ips.clone(),
            resolver.clone(),
            store.clone(),
            shared_queue.clone(),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            shared_queue,
            deployer.clone(),
            catalog.clone(),
            keys.clone(),
        ));

        info!(
            "Zone sync ready: zones in {}, catalog {} at {}, DNSSEC {}",
            config.zone_dir.display(),
            config.catalog_zone,
            config.catalog_path.display(),
            if keys.is_some() { "on" } else { "off" }
        );

        Self {
            config,
            queue,
            store,
            resolver,
            deployer,
            catalog,
            keys,
            dispatcher,
        }
    }

    /// Start the configured number of workers on this context's queue
    pub fn spawn_workers(&self) -> WorkerPool {
        WorkerPool::spawn(
            self.queue.clone(),
            self.dispatcher.clone(),
            self.config.workers,
        )
    }
}

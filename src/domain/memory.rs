use super::{Domain, DomainStore};
use crate::dnssec::ZoneKeyRecord;
use crate::error::StoreError;
use crate::zone::absolute_name;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// In-process domain store
#[derive(Debug, Default, Clone)]
pub struct MemoryDomainStore {
    domains: Arc<DashMap<String, Domain>>,
    keys: Arc<DashMap<String, Vec<ZoneKeyRecord>>>,
}

impl MemoryDomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a domain
    pub fn upsert(&self, domain: Domain) {
        self.domains.insert(domain.origin(), domain);
    }

    /// Remove a domain and its keys
    pub fn remove(&self, name: &str) -> Option<Domain> {
        let name = absolute_name(name);
        self.keys.remove(&name);
        self.domains.remove(&name).map(|(_, domain)| domain)
    }
}

#[async_trait]
impl DomainStore for MemoryDomainStore {
    async fn load(&self, name: &str) -> Result<Option<Domain>, StoreError> {
        Ok(self
            .domains
            .get(&absolute_name(name))
            .map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.domains.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn keys(&self, name: &str) -> Result<Vec<ZoneKeyRecord>, StoreError> {
        Ok(self
            .keys
            .get(&absolute_name(name))
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn save_key(&self, name: &str, key: ZoneKeyRecord) -> Result<(), StoreError> {
        let name = absolute_name(name);
        if !self.domains.contains_key(&name) {
            return Err(StoreError::NotFound(name));
        }
        let mut keys = self.keys.entry(name).or_default();
        keys.retain(|k| k.key_id != key.key_id || k.flags != key.flags);
        keys.push(key);
        Ok(())
    }

    async fn delete_keys(&self, name: &str) -> Result<(), StoreError> {
        self.keys.remove(&absolute_name(name));
        Ok(())
    }
}

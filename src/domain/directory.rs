use super::{Domain, DomainStore};
use crate::dnssec::ZoneKeyRecord;
use crate::error::StoreError;
use crate::fsutil::{remove_if_exists, write_atomic_async};
use crate::zone::absolute_name;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const KEYS_SUFFIX: &str = ".keys.json";

/// Domains stored as JSON descriptors: `{dir}/{domain}.json` for the
/// domain and `{dir}/{domain}.keys.json` for its keys
#[derive(Debug, Clone)]
pub struct DirectoryDomainStore {
    dir: PathBuf,
}

impl DirectoryDomainStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_stem(name: &str) -> String {
        absolute_name(name).trim_end_matches('.').to_string()
    }

    fn domain_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::file_stem(name)))
    }

    fn keys_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}", Self::file_stem(name), KEYS_SUFFIX))
    }

    /// Write a domain descriptor
    pub async fn save(&self, domain: &Domain) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(domain).map_err(|e| StoreError::Corrupt {
            domain: domain.name.clone(),
            message: e.to_string(),
        })?;
        write_atomic_async(self.domain_path(&domain.name), json).await?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        path: &Path,
        domain: &str,
    ) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                domain: domain.to_string(),
                message: e.to_string(),
            })
    }

    async fn write_keys(&self, name: &str, keys: &[ZoneKeyRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(keys).map_err(|e| StoreError::Corrupt {
            domain: name.to_string(),
            message: e.to_string(),
        })?;
        write_atomic_async(self.keys_path(name), json).await?;
        Ok(())
    }
}

#[async_trait]
impl DomainStore for DirectoryDomainStore {
    async fn load(&self, name: &str) -> Result<Option<Domain>, StoreError> {
        let domain: Option<Domain> = Self::read_json(&self.domain_path(name), name).await?;
        Ok(domain.map(|mut domain| {
            domain.name = absolute_name(&domain.name);
            domain
        }))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.ends_with(KEYS_SUFFIX) {
                continue;
            }
            if let Some(stem) = file_name.strip_suffix(".json") {
                names.push(absolute_name(stem));
            }
        }
        names.sort();
        debug!("Found {} domains in {}", names.len(), self.dir.display());
        Ok(names)
    }

    async fn keys(&self, name: &str) -> Result<Vec<ZoneKeyRecord>, StoreError> {
        Ok(Self::read_json(&self.keys_path(name), name)
            .await?
            .unwrap_or_default())
    }

    async fn save_key(&self, name: &str, key: ZoneKeyRecord) -> Result<(), StoreError> {
        if !fs::try_exists(self.domain_path(name)).await? {
            return Err(StoreError::NotFound(absolute_name(name)));
        }
        let mut keys = self.keys(name).await?;
        keys.retain(|k| k.key_id != key.key_id || k.flags != key.flags);
        keys.push(key);
        self.write_keys(name, &keys).await
    }

    async fn delete_keys(&self, name: &str) -> Result<(), StoreError> {
        remove_if_exists(&self.keys_path(name))?;
        Ok(())
    }
}

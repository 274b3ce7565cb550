use super::key::{KSK_FLAGS, ZSK_FLAGS, parse_timestamp};
use super::{
    DnssecTooling, KeyAlgorithm, KeyDateField, KeySpec, ZoneKeyRecord, key_tag_from_rdata,
};
use crate::domain::{Domain, DomainStore};
use crate::error::KeyError;
use crate::fsutil::{remove_if_exists, write_atomic_async};
use crate::jobs::{Job, JobQueue};
use crate::zone::{RecordType, ZoneParser, absolute_name};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Key sizes and algorithm used for new keys
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    pub algorithm: String,
    pub ksk_size: u32,
    pub zsk_size: u32,
}

/// Result of reconciling a domain's key files
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeOutcome {
    pub written: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// The domain had no keys and a key-generation job was scheduled
    pub keys_requested: bool,
}

/// Creates, imports and writes out DNSSEC key pairs
pub struct KeyProvisioner {
    tools: Arc<dyn DnssecTooling>,
    store: Arc<dyn DomainStore>,
    queue: Arc<dyn JobQueue>,
    key_dir: PathBuf,
    policy: KeyPolicy,
}

impl KeyProvisioner {
    pub fn new(
        tools: Arc<dyn DnssecTooling>,
        store: Arc<dyn DomainStore>,
        queue: Arc<dyn JobQueue>,
        key_dir: impl Into<PathBuf>,
        policy: KeyPolicy,
    ) -> Self {
        Self {
            tools,
            store,
            queue,
            key_dir: key_dir.into(),
            policy,
        }
    }

    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    /// Run the key generator in a scratch directory and import its output.
    /// The scratch directory is removed on every path.
    pub async fn generate_key(
        &self,
        domain: &str,
        flags: u16,
        algorithm: &str,
        size: u32,
    ) -> Result<ZoneKeyRecord, KeyError> {
        let size = match KeyAlgorithm::from_mnemonic(algorithm) {
            Some(alg) if !alg.takes_key_size() => 0,
            _ => size,
        };
        let scratch = TempDir::new()?;
        let spec = KeySpec {
            domain,
            flags,
            algorithm,
            size,
        };

        let files = self.tools.generate(&spec, scratch.path()).await?;
        let public_text = tokio::fs::read_to_string(&files.public_path).await?;
        let private_text = tokio::fs::read_to_string(&files.private_path).await?;
        drop(scratch);

        let key = self.import_key_data(&private_text, &public_text).await?;
        info!(
            "Generated {} key {} for {}",
            if key.is_ksk() { "KSK" } else { "ZSK" },
            key.key_id,
            domain
        );
        Ok(key)
    }

    /// Build a key record from `.private` and `.key` texts.
    ///
    /// Lifecycle lines of the private text become typed dates, everything
    /// else stays opaque. Flags and algorithm come from the DNSKEY, the key
    /// ID from the DS records derived by the DS tool.
    pub async fn import_key_data(
        &self,
        private_text: &str,
        public_text: &str,
    ) -> Result<ZoneKeyRecord, KeyError> {
        let mut key = ZoneKeyRecord::default();

        let mut payload = Vec::new();
        for line in private_text.lines() {
            let date = line.split_once(':').and_then(|(label, value)| {
                KeyDateField::from_label(label).map(|field| (field, value))
            });
            match date {
                Some((field, value)) => match parse_timestamp(value) {
                    Some(at) => key.dates.set(field, at),
                    None => warn!("Ignoring unparseable {} date '{}'", field.label(), value.trim()),
                },
                None => payload.push(line),
            }
        }
        key.private_key = format!("{}\n", payload.join("\n").trim_end());

        let public_records = ZoneParser::new()
            .parse_records(public_text)
            .map_err(|e| KeyError::InvalidKeyData(e.to_string()))?;
        let (owner, dnskey) = public_records
            .iter()
            .find(|(_, rtype, _)| *rtype == RecordType::DNSKEY)
            .map(|(owner, _, data)| (owner.clone(), data.content.clone()))
            .ok_or_else(|| KeyError::InvalidKeyData("no DNSKEY record".to_string()))?;

        let mut fields = dnskey.split_whitespace();
        key.flags = fields
            .next()
            .and_then(|f| f.parse().ok())
            .ok_or_else(|| KeyError::InvalidKeyData(format!("bad DNSKEY flags: {}", dnskey)))?;
        key.algorithm = fields
            .nth(1)
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| KeyError::InvalidKeyData(format!("bad DNSKEY algorithm: {}", dnskey)))?;
        key.public_key = public_text.to_string();

        let ds_text = self.tools.ds_from_key(&owner, public_text).await?;
        let ds_records = ZoneParser::new()
            .parse_records(&ds_text)
            .map_err(|e| KeyError::InvalidKeyData(e.to_string()))?;
        for (_, rtype, data) in &ds_records {
            if *rtype == RecordType::DS {
                key.ds_records.push(data.content.clone());
            }
        }

        let key_id = key
            .ds_records
            .first()
            .and_then(|ds| ds.split_whitespace().next())
            .map(|id| id.trim_start_matches('0'))
            .map(|id| if id.is_empty() { "0" } else { id })
            .and_then(|id| id.parse::<u16>().ok())
            .ok_or_else(|| KeyError::InvalidKeyData("no DS record with key ID".to_string()))?;
        key.key_id = key_id;

        match key_tag_from_rdata(&dnskey) {
            Some(tag) if tag != key_id => warn!(
                "Key tag {} computed from DNSKEY of {} differs from DS key ID {}",
                tag, owner, key_id
            ),
            None => warn!("Cannot compute key tag for DNSKEY of {}", owner),
            _ => {}
        }

        debug!("Imported key {} (flags {}) for {}", key.key_id, key.flags, owner);
        Ok(key)
    }

    /// Generate and store one KSK and one ZSK for a domain, then schedule a
    /// redeploy so the signed zone picks them up
    pub async fn create_default_keys(&self, domain: &str) -> Result<Vec<ZoneKeyRecord>, KeyError> {
        let mut created = Vec::with_capacity(2);
        for (flags, size) in [
            (KSK_FLAGS, self.policy.ksk_size),
            (ZSK_FLAGS, self.policy.zsk_size),
        ] {
            let key = self
                .generate_key(domain, flags, &self.policy.algorithm, size)
                .await?;
            self.store.save_key(domain, key.clone()).await?;
            created.push(key);
        }

        self.queue
            .enqueue(Job::AddDomain {
                domain: absolute_name(domain),
            })
            .await?;
        Ok(created)
    }

    /// Make the key directory match the domain's keys: write missing
    /// `.key`/`.private` pairs and delete files of keys the domain no
    /// longer owns. A domain without keys gets a key-generation job.
    pub async fn materialize_keys(&self, domain: &Domain) -> Result<MaterializeOutcome, KeyError> {
        let mut outcome = MaterializeOutcome::default();
        let keys = self.store.keys(&domain.name).await?;

        if keys.is_empty() {
            info!("{} has no signing keys, requesting generation", domain.name);
            self.queue
                .enqueue(Job::CreateKeys {
                    domain: domain.origin(),
                })
                .await?;
            outcome.keys_requested = true;
            return Ok(outcome);
        }

        let mut known = HashSet::new();
        for key in &keys {
            let stem = key.file_stem(&domain.name);
            for (extension, contents) in [
                ("key", key.public_key.clone()),
                ("private", key.private_file_text()),
            ] {
                let file_name = format!("{}.{}", stem, extension);
                let path = self.key_dir.join(&file_name);
                known.insert(file_name);
                if tokio::fs::try_exists(&path).await? {
                    continue;
                }
                write_atomic_async(path.clone(), contents.into_bytes()).await?;
                debug!("Wrote {}", path.display());
                outcome.written.push(path);
            }
        }

        for path in self.key_files(&domain.name).await? {
            let stale = path
                .file_name()
                .map(|name| !known.contains(&*name.to_string_lossy()))
                .unwrap_or(false);
            if stale && remove_if_exists(&path)? {
                info!("Removed stale key file {}", path.display());
                outcome.removed.push(path);
            }
        }

        Ok(outcome)
    }

    /// Delete every key file of a domain
    pub async fn purge_key_files(&self, domain: &str) -> Result<Vec<PathBuf>, KeyError> {
        let mut removed = Vec::new();
        for path in self.key_files(domain).await? {
            if remove_if_exists(&path)? {
                removed.push(path);
            }
        }
        if !removed.is_empty() {
            info!("Removed {} key files of {}", removed.len(), domain);
        }
        Ok(removed)
    }

    /// Files in the key directory named `K{domain}.+*.key` or `.private`
    async fn key_files(&self, domain: &str) -> Result<Vec<PathBuf>, KeyError> {
        let prefix = format!("K{}+", absolute_name(domain));
        let mut entries = match tokio::fs::read_dir(&self.key_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && (name.ends_with(".key") || name.ends_with(".private"))
            {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

use crate::command::CommandTemplate;
use crate::dnssec::KeyAlgorithm;
use crate::error::ConfigError;
use crate::zone::absolute_name;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name-server control command templates.
///
/// `add` takes `%1$s` zone, `%2$s` file, `%3$s` allow-transfer list;
/// `reload` takes zone and file; `delete` takes the zone only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTemplates {
    pub add: String,
    pub reload: String,
    pub delete: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            add: "rndc addzone %1$s '{ type primary; file \"%2$s\"; allow-transfer { %3$s; }; };'"
                .to_string(),
            reload: "rndc reload %1$s".to_string(),
            delete: "rndc delzone -clean %1$s".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding `{domain}.db` zone files
    pub zone_dir: PathBuf,

    /// Directory holding DNSSEC `K*.key`/`K*.private` files
    pub key_dir: PathBuf,

    /// Catalog zone file
    pub catalog_path: PathBuf,

    /// Name of the catalog zone
    pub catalog_zone: String,

    pub commands: CommandTemplates,

    /// Secondaries always allowed to transfer every zone
    pub slave_ips: Vec<IpAddr>,

    /// Key generation executable (`dnssec-keygen`)
    pub keygen_command: String,

    /// DS derivation executable (`dnssec-dsfromkey`)
    pub dsfromkey_command: String,

    /// Algorithm mnemonic passed to the key generator
    pub key_algorithm: String,

    /// Key sizes in bits; 0 leaves the size to the tool (EC algorithms)
    pub ksk_size: u32,
    pub zsk_size: u32,

    /// Whether zones get signing keys at all
    pub dnssec_enabled: bool,

    /// Number of job workers
    pub workers: usize,

    /// How long resolved NS addresses are cached
    pub resolver_ttl_secs: u64,

    /// Directory of JSON domain descriptors
    pub domain_dir: PathBuf,

    /// Default tracing filter when RUST_LOG is not set
    pub log_filter: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            zone_dir: PathBuf::from("/var/lib/bind/zones"),
            key_dir: PathBuf::from("/var/lib/bind/keys"),
            catalog_path: PathBuf::from("/var/lib/bind/catalog.db"),
            catalog_zone: "catalog.invalid.".to_string(),
            commands: CommandTemplates::default(),
            slave_ips: Vec::new(),
            keygen_command: "dnssec-keygen".to_string(),
            dsfromkey_command: "dnssec-dsfromkey".to_string(),
            key_algorithm: "ECDSAP256SHA256".to_string(),
            ksk_size: 0,
            zsk_size: 0,
            dnssec_enabled: true,
            workers: 4,
            resolver_ttl_secs: 300, // 5 minutes
            domain_dir: PathBuf::from("/var/lib/zonesync/domains"),
            log_filter: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Load from a TOML file, apply environment overrides and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML without validating
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.catalog_zone = absolute_name(&config.catalog_zone);
        Ok(config)
    }

    /// Apply `ZONESYNC_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("ZONESYNC_ZONE_DIR") {
            self.zone_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("ZONESYNC_KEY_DIR") {
            self.key_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("ZONESYNC_CATALOG_PATH") {
            self.catalog_path = PathBuf::from(path);
        }
        if let Some(zone) = lookup("ZONESYNC_CATALOG_ZONE") {
            self.catalog_zone = absolute_name(&zone);
        }
        if let Some(add) = lookup("ZONESYNC_ADD_COMMAND") {
            self.commands.add = add;
        }
        if let Some(reload) = lookup("ZONESYNC_RELOAD_COMMAND") {
            self.commands.reload = reload;
        }
        if let Some(delete) = lookup("ZONESYNC_DELETE_COMMAND") {
            self.commands.delete = delete;
        }

        if let Some(slave_ips) = lookup("ZONESYNC_SLAVE_IPS") {
            let ips: Result<Vec<IpAddr>, _> = slave_ips
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<IpAddr>()
                        .map_err(|_| ConfigError::InvalidSlaveIp(s.to_string()))
                })
                .collect();
            self.slave_ips = ips?;
        }

        if let Some(keygen) = lookup("ZONESYNC_KEYGEN_COMMAND") {
            self.keygen_command = keygen;
        }
        if let Some(dsfromkey) = lookup("ZONESYNC_DSFROMKEY_COMMAND") {
            self.dsfromkey_command = dsfromkey;
        }
        if let Some(algorithm) = lookup("ZONESYNC_KEY_ALGORITHM") {
            self.key_algorithm = algorithm;
        }
        if let Some(size) = lookup("ZONESYNC_KSK_SIZE") {
            self.ksk_size = size
                .parse()
                .map_err(|_| ConfigError::InvalidKeySettings(format!("KSK size {}", size)))?;
        }
        if let Some(size) = lookup("ZONESYNC_ZSK_SIZE") {
            self.zsk_size = size
                .parse()
                .map_err(|_| ConfigError::InvalidKeySettings(format!("ZSK size {}", size)))?;
        }
        if let Some(enabled) = lookup("ZONESYNC_DNSSEC") {
            self.dnssec_enabled = parse_bool(&enabled, true);
        }

        if let Some(workers) = lookup("ZONESYNC_WORKERS") {
            self.workers = workers
                .parse()
                .map_err(|_| ConfigError::InvalidWorkers(workers.clone()))?;
        }
        if let Some(ttl) = lookup("ZONESYNC_RESOLVER_TTL") {
            self.resolver_ttl_secs = ttl
                .parse()
                .map_err(|_| ConfigError::ParseError(format!("Invalid resolver TTL: {}", ttl)))?;
        }
        if let Some(dir) = lookup("ZONESYNC_DOMAIN_DIR") {
            self.domain_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup("ZONESYNC_LOG_FILTER") {
            self.log_filter = filter;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, path) in [
            ("zone_dir", &self.zone_dir),
            ("key_dir", &self.key_dir),
            ("catalog_path", &self.catalog_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidPath {
                    field,
                    value: String::new(),
                });
            }
        }
        if self.catalog_path.file_name().is_none() {
            return Err(ConfigError::InvalidPath {
                field: "catalog_path",
                value: self.catalog_path.display().to_string(),
            });
        }

        let zone = self.catalog_zone.trim_end_matches('.');
        if zone.is_empty() || zone.split('.').any(|label| label.is_empty() || label.len() > 63) {
            return Err(ConfigError::InvalidCatalogZone(self.catalog_zone.clone()));
        }

        for (name, template, max_args) in [
            ("add", &self.commands.add, 3),
            ("reload", &self.commands.reload, 2),
            ("delete", &self.commands.delete, 1),
        ] {
            CommandTemplate::new(template.as_str())
                .validate(max_args)
                .map_err(|message| ConfigError::InvalidCommandTemplate { name, message })?;
        }

        // Worker count must be reasonable
        if self.workers == 0 || self.workers > 256 {
            return Err(ConfigError::InvalidWorkers(format!(
                "{} (expected 1..=256)",
                self.workers
            )));
        }

        if self.dnssec_enabled && KeyAlgorithm::from_mnemonic(&self.key_algorithm).is_none() {
            return Err(ConfigError::InvalidKeySettings(format!(
                "unknown key algorithm '{}'",
                self.key_algorithm
            )));
        }

        Ok(())
    }

    pub fn resolver_ttl(&self) -> Duration {
        Duration::from_secs(self.resolver_ttl_secs)
    }
}

/// Parse a boolean from a string, with a default value for invalid input
pub(crate) fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

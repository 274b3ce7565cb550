use crate::config::parse_bool;
use crate::error::JobError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of change a `bind_zone_changed` job reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ZoneChange {
    Add,
    Change,
    Remove,
    /// Delete from the name server and add again, e.g. after the
    /// allow-transfer list changed
    Readd,
}

impl ZoneChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Remove => "remove",
            Self::Readd => "readd",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "change" => Some(Self::Change),
            "remove" => Some(Self::Remove),
            "readd" => Some(Self::Readd),
            _ => None,
        }
    }
}

/// Catalog membership update mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogChange {
    Add,
    Change,
    Remove,
}

impl CatalogChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Change => "change",
            Self::Remove => "remove",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "add" => Some(Self::Add),
            "change" => Some(Self::Change),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }
}

/// Every job the workers handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// `bind_add_domain`, also delivered as `bind_records_changed`
    AddDomain { domain: String },
    DeleteDomain { domain: String },
    RenameDomain { old_name: String, domain: String },
    ZoneChanged {
        domain: String,
        change: ZoneChange,
        /// Reload this file directly instead of deploying the domain
        filename: Option<PathBuf>,
        no_catalog: bool,
    },
    UpdateCatalog { domain: String, change: CatalogChange },
    CreateKeys { domain: String },
    RebuildZones,
    RebuildCatalog,
}

impl Job {
    /// Queue name of the job
    pub fn name(&self) -> &'static str {
        match self {
            Job::AddDomain { .. } => "bind_add_domain",
            Job::DeleteDomain { .. } => "bind_delete_domain",
            Job::RenameDomain { .. } => "bind_rename_domain",
            Job::ZoneChanged { .. } => "bind_zone_changed",
            Job::UpdateCatalog { .. } => "bind_update_catalog",
            Job::CreateKeys { .. } => "bind_create_keys",
            Job::RebuildZones => "bind_rebuild_zones",
            Job::RebuildCatalog => "bind_rebuild_catalog",
        }
    }

    /// Domain the job concerns, if any
    pub fn domain(&self) -> Option<&str> {
        match self {
            Job::AddDomain { domain }
            | Job::DeleteDomain { domain }
            | Job::RenameDomain { domain, .. }
            | Job::ZoneChanged { domain, .. }
            | Job::UpdateCatalog { domain, .. }
            | Job::CreateKeys { domain } => Some(domain),
            Job::RebuildZones | Job::RebuildCatalog => None,
        }
    }

    /// Decode a job from its queue name and flat payload
    pub fn from_envelope(envelope: &JobEnvelope) -> Result<Job, JobError> {
        let name = envelope.name.as_str();
        let job = match name {
            "bind_add_domain" | "bind_records_changed" => Job::AddDomain {
                domain: envelope.require("domain")?,
            },
            "bind_delete_domain" => Job::DeleteDomain {
                domain: envelope.require("domain")?,
            },
            "bind_rename_domain" => Job::RenameDomain {
                old_name: envelope.require("oldName")?,
                domain: envelope.require("domain")?,
            },
            "bind_zone_changed" => {
                let change = envelope.require("change")?;
                Job::ZoneChanged {
                    domain: envelope.require("domain")?,
                    change: ZoneChange::parse(&change)
                        .ok_or_else(|| envelope.invalid("change", &change))?,
                    filename: envelope
                        .field("filename")
                        .filter(|f| !f.is_empty())
                        .map(PathBuf::from),
                    no_catalog: envelope
                        .field("noCatalog")
                        .is_some_and(|flag| parse_bool(&flag, false)),
                }
            }
            "bind_update_catalog" => {
                let change = envelope.require("change")?;
                Job::UpdateCatalog {
                    domain: envelope.require("domain")?,
                    change: CatalogChange::parse(&change)
                        .ok_or_else(|| envelope.invalid("change", &change))?,
                }
            }
            "bind_create_keys" => Job::CreateKeys {
                domain: envelope.require("domain")?,
            },
            "bind_rebuild_zones" => Job::RebuildZones,
            "bind_rebuild_catalog" => Job::RebuildCatalog,
            other => return Err(JobError::UnknownJob(other.to_string())),
        };
        Ok(job)
    }

    /// Encode as an envelope with a fresh id
    pub fn to_envelope(&self) -> JobEnvelope {
        let mut payload = BTreeMap::new();
        let mut put = |key: &str, value: &str| {
            payload.insert(key.to_string(), Value::String(value.to_string()));
        };

        match self {
            Job::AddDomain { domain } | Job::DeleteDomain { domain } | Job::CreateKeys { domain } => {
                put("domain", domain)
            }
            Job::RenameDomain { old_name, domain } => {
                put("oldName", old_name);
                put("domain", domain);
            }
            Job::ZoneChanged {
                domain,
                change,
                filename,
                no_catalog,
            } => {
                put("domain", domain);
                put("change", change.as_str());
                if let Some(filename) = filename {
                    put("filename", &filename.to_string_lossy());
                }
                if *no_catalog {
                    put("noCatalog", "true");
                }
            }
            Job::UpdateCatalog { domain, change } => {
                put("domain", domain);
                put("change", change.as_str());
            }
            Job::RebuildZones | Job::RebuildCatalog => {}
        }

        JobEnvelope {
            id: Uuid::new_v4(),
            name: self.name().to_string(),
            payload,
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::ZoneChanged { domain, change, .. } => {
                write!(f, "{}({}, {})", self.name(), domain, change.as_str())
            }
            Job::UpdateCatalog { domain, change } => {
                write!(f, "{}({}, {})", self.name(), domain, change.as_str())
            }
            Job::RenameDomain { old_name, domain } => {
                write!(f, "{}({} -> {})", self.name(), old_name, domain)
            }
            _ => match self.domain() {
                Some(domain) => write!(f, "{}({})", self.name(), domain),
                None => f.write_str(self.name()),
            },
        }
    }
}

/// A job as it travels through a queue: name, flat payload and an id for
/// result correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,
}

impl JobEnvelope {
    /// Parse one JSON envelope
    pub fn from_json(text: &str) -> Result<Self, JobError> {
        serde_json::from_str(text).map_err(|e| JobError::Malformed(e.to_string()))
    }

    /// Scalar payload value as a string; objects and arrays are ignored
    pub fn field(&self, key: &str) -> Option<String> {
        match self.payload.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn require(&self, key: &'static str) -> Result<String, JobError> {
        self.field(key)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| JobError::MissingField {
                job: self.name.clone(),
                field: key,
            })
    }

    fn invalid(&self, field: &'static str, value: &str) -> JobError {
        JobError::InvalidField {
            job: self.name.clone(),
            field,
            value: value.to_string(),
        }
    }
}

//! Domains as delivered by the record store, and the store contract.

mod directory;
mod memory;

pub use directory::DirectoryDomainStore;
pub use memory::MemoryDomainStore;

use crate::dnssec::ZoneKeyRecord;
use crate::error::StoreError;
use crate::zone::{
    RecordData, RecordType, Soa, ZoneDocument, absolute_name, document::relativize,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::warn;

/// SOA values kept with the domain; the serial is the last one deployed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoaSettings {
    pub primary_ns: String,
    pub hostmaster: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    pub ttl: u32,
}

impl Default for SoaSettings {
    fn default() -> Self {
        Self {
            primary_ns: "ns1.invalid.".to_string(),
            hostmaster: "hostmaster.invalid.".to_string(),
            serial: 0,
            refresh: 10800,
            retry: 3600,
            expire: 604800,
            minimum: 3600,
            ttl: 3600,
        }
    }
}

/// One stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Owner relative to the domain (`""` or `@` for the apex) or absolute
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub rtype: RecordType,
    pub content: String,
    /// Falls back to the SOA TTL
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub priority: Option<u16>,
    #[serde(default)]
    pub disabled: bool,
}

impl Record {
    pub fn new(name: &str, rtype: RecordType, content: &str) -> Self {
        Self {
            name: name.to_string(),
            rtype,
            content: content.to_string(),
            ttl: None,
            priority: None,
            disabled: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    #[serde(default)]
    pub soa: SoaSettings,
    #[serde(default)]
    pub records: Vec<Record>,
    /// Whether the zone is signed
    #[serde(default = "default_true")]
    pub dnssec: bool,
}

impl Domain {
    pub fn new(name: &str) -> Self {
        Self {
            name: absolute_name(name),
            soa: SoaSettings::default(),
            records: Vec::new(),
            dnssec: true,
        }
    }

    /// Absolute lowercase name with trailing dot
    pub fn origin(&self) -> String {
        absolute_name(&self.name)
    }

    /// Name without the trailing dot, as used in file names and commands
    pub fn bare_name(&self) -> String {
        self.origin().trim_end_matches('.').to_string()
    }

    pub fn active_records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| !r.disabled)
    }

    fn apex_records(&self, rtype: RecordType) -> impl Iterator<Item = &Record> {
        let origin = self.origin();
        self.active_records()
            .filter(move |r| r.rtype == rtype && relativize(&r.name, &origin).is_empty())
    }

    /// Whether an enabled NS record exists at the apex. Zones without one
    /// are not loaded into the name server.
    pub fn has_ns(&self) -> bool {
        self.apex_records(RecordType::NS).next().is_some()
    }

    /// Apex NS targets, absolute
    pub fn ns_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .apex_records(RecordType::NS)
            .map(|r| self.qualify(&r.content))
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// A/AAAA addresses the zone itself publishes for `host`
    pub fn addresses_of(&self, host: &str) -> Vec<IpAddr> {
        let origin = self.origin();
        let host = absolute_name(host);
        let Some(name) = host.strip_suffix(origin.as_str()) else {
            return Vec::new();
        };
        if !(name.is_empty() || name.ends_with('.')) {
            return Vec::new();
        }
        let relative = name.trim_end_matches('.');

        self.active_records()
            .filter(|r| matches!(r.rtype, RecordType::A | RecordType::AAAA))
            .filter(|r| relativize(&r.name, &origin) == relative)
            .filter_map(|r| r.content.trim().parse().ok())
            .collect()
    }

    /// Make record content naming a host absolute
    fn qualify(&self, target: &str) -> String {
        let target = target.trim();
        if target == "@" {
            self.origin()
        } else if target.ends_with('.') {
            target.to_lowercase()
        } else {
            format!("{}.{}", target.to_lowercase(), self.origin())
        }
    }

    /// Zone document of all enabled records with the given serial.
    ///
    /// Stored SOA records are ignored in favor of the SOA settings; records
    /// that cannot be placed are logged and skipped.
    pub fn to_document(&self, serial: u32) -> ZoneDocument {
        let soa = Soa {
            primary_ns: absolute_name(&self.soa.primary_ns),
            hostmaster: absolute_name(&self.soa.hostmaster),
            serial,
            refresh: self.soa.refresh,
            retry: self.soa.retry,
            expire: self.soa.expire,
            minimum: self.soa.minimum,
            ttl: self.soa.ttl,
        };
        let mut document = ZoneDocument::new(&self.name, soa);
        document.default_ttl = self.soa.ttl;

        for record in self.active_records() {
            if record.rtype == RecordType::SOA {
                continue;
            }
            let ttl = record.ttl.unwrap_or(self.soa.ttl);
            let data = match (record.rtype.has_priority(), record.priority) {
                (true, Some(priority)) => {
                    RecordData::with_priority(record.content.trim(), ttl, priority)
                }
                (true, None) => RecordData::with_priority(record.content.trim(), ttl, 0),
                (false, _) => RecordData::new(record.content.trim(), ttl),
            };
            if let Err(e) = document.add(&record.name, record.rtype, data) {
                warn!("Skipping record {} {} of {}: {}", record.name, record.rtype, self.name, e);
            }
        }

        document
    }
}

/// Read access to domains and their signing keys
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// Load a domain by name
    async fn load(&self, name: &str) -> Result<Option<Domain>, StoreError>;

    /// Names of all domains
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Signing keys owned by a domain
    async fn keys(&self, name: &str) -> Result<Vec<ZoneKeyRecord>, StoreError>;

    /// Attach a key to a domain
    async fn save_key(&self, name: &str, key: ZoneKeyRecord) -> Result<(), StoreError>;

    /// Drop all keys of a domain
    async fn delete_keys(&self, name: &str) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain() -> Domain {
        let mut domain = Domain::new("Example.com");
        domain.records = vec![
            Record::new("@", RecordType::NS, "ns1.example.com."),
            Record::new("", RecordType::NS, "ns2"),
            Record::new("ns1", RecordType::A, "192.0.2.53"),
            Record::new("ns2.example.com.", RecordType::AAAA, "2001:db8::53"),
            Record::new("www", RecordType::A, "203.0.113.1"),
            Record {
                priority: Some(10),
                ..Record::new("", RecordType::MX, "mail.example.com.")
            },
            Record {
                disabled: true,
                ..Record::new("old", RecordType::A, "203.0.113.9")
            },
        ];
        domain
    }

    #[test]
    fn test_has_ns_and_targets() {
        let domain = domain();
        assert!(domain.has_ns());
        assert_eq!(
            domain.ns_targets(),
            vec!["ns1.example.com.".to_string(), "ns2.example.com.".to_string()]
        );
    }

    #[test]
    fn test_disabled_ns_does_not_count() {
        let mut domain = Domain::new("example.com.");
        domain.records.push(Record {
            disabled: true,
            ..Record::new("", RecordType::NS, "ns1.example.net.")
        });
        domain
            .records
            .push(Record::new("sub", RecordType::NS, "ns1.example.net."));
        assert!(!domain.has_ns());
    }

    #[test]
    fn test_addresses_of_in_zone_host() {
        let domain = domain();
        assert_eq!(
            domain.addresses_of("ns1.example.com."),
            vec!["192.0.2.53".parse::<IpAddr>().unwrap()]
        );
        assert_eq!(
            domain.addresses_of("ns2.example.com"),
            vec!["2001:db8::53".parse::<IpAddr>().unwrap()]
        );
        assert!(domain.addresses_of("ns1.example.net.").is_empty());
        assert!(domain.addresses_of("ns1.notexample.com.").is_empty());
    }

    #[test]
    fn test_to_document_skips_disabled() {
        let doc = domain().to_document(2024030900);
        assert_eq!(doc.origin, "example.com.");
        assert_eq!(doc.soa.serial, 2024030900);
        assert_eq!(doc.get("", RecordType::NS).unwrap().len(), 2);
        assert_eq!(doc.get("", RecordType::MX).unwrap()[0].priority, Some(10));
        assert!(doc.get("old", RecordType::A).is_none());
    }
}

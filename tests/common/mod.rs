//! Fakes shared by the integration tests: a command runner and job queue
//! that record what they are given, a fixed resolver, and DNSSEC tooling
//! that hands out the RFC 4034 example key.

#![allow(dead_code)] // Not every test file uses every helper

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;
use zonesync::command::{CommandRunner, ZoneCommands};
use zonesync::config::CommandTemplates;
use zonesync::dnssec::{
    DnssecTooling, GeneratedKeyFiles, KeyPolicy, KeyProvisioner, KeySpec, key_tag_from_rdata,
};
use zonesync::domain::{Domain, MemoryDomainStore, Record};
use zonesync::error::{CommandError, JobError, KeyError};
use zonesync::jobs::{Job, JobQueue};
use zonesync::resolve::{HostResolver, ResolverCache};
use zonesync::zone::RecordType;

/// Public key of the DNSKEY example in RFC 4034 section 5.4
pub const RFC_PUBLIC_KEY: &str = "AQOeiiR0GOMYkDshWoSKz9XzfwJr1AYtsmx3TGkJaNXVbfi/2pHm822aJ5iI9BMzNXxeYCmZDRD99WYwYqUSdjMmmAphXdvxegXd/M5+X7OrzKBaMbCVdFLUUh6DhweJBjEVv5f2wwjM9XzcnOf+EPbtG9DMBmADjFDc2w/rljwvFw==";

/// SHA-1 digest of the RFC example DS
pub const RFC_DS_DIGEST: &str = "2BB183AF5F22588179A53B0A98631FAD1A292118";

/// Command templates that are easy to assert on
pub fn test_templates() -> CommandTemplates {
    CommandTemplates {
        add: "add %1$s %2$s %3$s".to_string(),
        reload: "reload %1$s %2$s".to_string(),
        delete: "delete %1$s".to_string(),
    }
}

/// Records every command line and succeeds
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command_line: &str) -> Result<(), CommandError> {
        self.commands.lock().push(command_line.to_string());
        Ok(())
    }
}

/// Keeps enqueued jobs for inspection instead of running them
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<Job>>,
}

impl RecordingQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().clone()
    }

    pub fn take(&self) -> Vec<Job> {
        std::mem::take(&mut *self.jobs.lock())
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: Job) -> Result<Uuid, JobError> {
        self.jobs.lock().push(job);
        Ok(Uuid::new_v4())
    }
}

/// Answers from a fixed table; unknown hosts fail
#[derive(Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn with(hosts: &[(&str, &str)]) -> Self {
        let mut table: HashMap<String, Vec<IpAddr>> = HashMap::new();
        for (host, ip) in hosts {
            table
                .entry(host.trim_end_matches('.').to_string())
                .or_default()
                .push(ip.parse().unwrap());
        }
        Self { hosts: table }
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.hosts
            .get(host.trim_end_matches('.'))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, host.to_string()))
    }
}

pub fn resolver_cache(hosts: &[(&str, &str)]) -> Arc<ResolverCache> {
    Arc::new(ResolverCache::new(
        Arc::new(StaticResolver::with(hosts)),
        Duration::from_secs(300),
    ))
}

/// Writes the RFC 4034 key with the requested flags and derives a DS
/// carrying the RFC digest
#[derive(Default)]
pub struct FakeDnssecTools {
    /// (domain, flags, algorithm, size) of every generate call
    pub generated: Mutex<Vec<(String, u16, String, u32)>>,
}

impl FakeDnssecTools {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl DnssecTooling for FakeDnssecTools {
    async fn generate(
        &self,
        spec: &KeySpec<'_>,
        out_dir: &Path,
    ) -> Result<GeneratedKeyFiles, KeyError> {
        self.generated.lock().push((
            spec.domain.to_string(),
            spec.flags,
            spec.algorithm.to_string(),
            spec.size,
        ));

        let rdata = format!("{} 3 5 {}", spec.flags, RFC_PUBLIC_KEY);
        let tag = key_tag_from_rdata(&rdata).unwrap();
        let stem = format!("K{}+005+{:05}", spec.domain, tag);
        let public_path = out_dir.join(format!("{}.key", stem));
        let private_path = out_dir.join(format!("{}.private", stem));

        std::fs::write(
            &public_path,
            format!(
                "; keyid {}, for {}\n{} IN DNSKEY {}\n",
                tag, spec.domain, spec.domain, rdata
            ),
        )?;
        std::fs::write(
            &private_path,
            "Private-key-format: v1.3\n\
             Algorithm: 5 (RSASHA1)\n\
             Modulus: c2VjcmV0\n\
             Publish: 20240309120000\n\
             Activate: 20240309120000\n",
        )?;

        Ok(GeneratedKeyFiles {
            public_path,
            private_path,
        })
    }

    async fn ds_from_key(&self, domain: &str, public_key: &str) -> Result<String, KeyError> {
        let rdata = public_key
            .lines()
            .find_map(|line| line.split_once("DNSKEY ").map(|(_, rdata)| rdata.trim()))
            .ok_or(KeyError::MissingOutput("DNSKEY"))?;
        let tag = key_tag_from_rdata(rdata).ok_or_else(|| {
            KeyError::InvalidKeyData(format!("cannot compute key tag of {}", rdata))
        })?;
        Ok(format!("{} IN DS {} 5 1 {}\n", domain, tag, RFC_DS_DIGEST))
    }
}

pub fn test_policy() -> KeyPolicy {
    KeyPolicy {
        algorithm: "RSASHA1".to_string(),
        ksk_size: 2048,
        zsk_size: 1024,
    }
}

/// Provisioner writing into `{dir}/keys` with fake tooling
pub fn key_provisioner(
    dir: &TempDir,
    tools: Arc<FakeDnssecTools>,
    store: Arc<MemoryDomainStore>,
    queue: Arc<RecordingQueue>,
) -> Arc<KeyProvisioner> {
    Arc::new(KeyProvisioner::new(
        tools,
        store,
        queue,
        dir.path().join("keys"),
        test_policy(),
    ))
}

pub fn zone_commands(runner: Arc<RecordingRunner>) -> ZoneCommands {
    ZoneCommands::new(&test_templates(), runner)
}

/// `example.com.` served by two in-zone name servers plus a web host
pub fn example_domain() -> Domain {
    let mut domain = Domain::new("example.com");
    domain.dnssec = false;
    domain.records = vec![
        Record::new("@", RecordType::NS, "ns1.example.com."),
        Record::new("@", RecordType::NS, "ns2.example.com."),
        Record::new("ns1", RecordType::A, "192.0.2.53"),
        Record::new("ns2", RecordType::AAAA, "2001:db8::53"),
        Record::new("www", RecordType::A, "203.0.113.10"),
    ];
    domain
}

/// A domain whose only NS lives outside the zone
pub fn hosted_domain(name: &str) -> Domain {
    let mut domain = Domain::new(name);
    domain.dnssec = false;
    domain.records = vec![
        Record::new("@", RecordType::NS, "ns.provider.net."),
        Record::new("@", RecordType::A, "198.51.100.7"),
    ];
    domain
}

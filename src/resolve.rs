//! Host resolution for allow-transfer lists, with a short-lived cache.

use crate::domain::Domain;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Resolves a host name to its addresses
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// The operating system resolver
#[derive(Debug, Default, Clone)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let host = host.trim_end_matches('.');
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        let mut ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        ips.sort();
        ips.dedup();
        Ok(ips)
    }
}

struct CachedAddresses {
    addresses: Vec<IpAddr>,
    expires_at: Instant,
}

/// Time-expiring cache in front of a [`HostResolver`]. Failed lookups are
/// not cached.
pub struct ResolverCache {
    resolver: Arc<dyn HostResolver>,
    entries: DashMap<String, CachedAddresses>,
    ttl: Duration,
}

impl ResolverCache {
    pub fn new(resolver: Arc<dyn HostResolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            entries: DashMap::new(),
            ttl,
        }
    }

    pub async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let key = host.trim_end_matches('.').to_lowercase();

        if let Some(entry) = self.entries.get(&key) {
            if entry.expires_at > Instant::now() {
                trace!("Resolver cache hit for {}", key);
                return Ok(entry.addresses.clone());
            }
        }
        self.entries.remove(&key);

        let addresses = self.resolver.lookup(&key).await?;
        debug!("Resolved {} to {:?}", key, addresses);
        // Sweep on every insert so hosts that are never asked for again do
        // not accumulate
        self.evict_expired();
        self.entries.insert(
            key,
            CachedAddresses {
                addresses: addresses.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(addresses)
    }

    /// Drop expired entries
    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Addresses allowed to transfer `domain`: its apex NS targets resolved to
/// A/AAAA, plus the static secondaries.
///
/// Targets inside the zone use the zone's own address records when it has
/// any; everything else goes through the cache. Unresolvable targets are
/// logged and left out.
pub async fn transfer_addresses(
    domain: &Domain,
    cache: &ResolverCache,
    slave_ips: &[IpAddr],
) -> BTreeSet<IpAddr> {
    let mut addresses: BTreeSet<IpAddr> = slave_ips.iter().copied().collect();

    for target in domain.ns_targets() {
        let local = domain.addresses_of(&target);
        if !local.is_empty() {
            addresses.extend(local);
            continue;
        }
        match cache.lookup(&target).await {
            Ok(resolved) => addresses.extend(resolved),
            Err(e) => warn!("Cannot resolve NS {} of {}: {}", target, domain.name, e),
        }
    }

    addresses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Record;
    use crate::zone::RecordType;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        hosts: HashMap<String, Vec<IpAddr>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HostResolver for CountingResolver {
        async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hosts
                .get(host)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, host.to_string()))
        }
    }

    fn resolver() -> Arc<CountingResolver> {
        Arc::new(CountingResolver {
            hosts: HashMap::from([
                (
                    "ns1.example.net".to_string(),
                    vec!["198.51.100.1".parse().unwrap()],
                ),
                (
                    "ns2.example.net".to_string(),
                    vec!["198.51.100.2".parse().unwrap()],
                ),
            ]),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_cache_hits_and_failures() {
        let inner = resolver();
        let cache = ResolverCache::new(inner.clone(), Duration::from_secs(300));

        cache.lookup("ns1.example.net.").await.unwrap();
        cache.lookup("NS1.example.net").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        assert!(cache.lookup("missing.example.net.").await.is_err());
        assert!(cache.lookup("missing.example.net.").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refreshed() {
        let inner = resolver();
        let cache = ResolverCache::new(inner.clone(), Duration::ZERO);

        cache.lookup("ns1.example.net").await.unwrap();
        cache.lookup("ns1.example.net").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        cache.evict_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_insert_drops_unrelated_expired_hosts() {
        let cache = ResolverCache::new(resolver(), Duration::from_millis(20));

        cache.lookup("ns1.example.net").await.unwrap();
        assert_eq!(cache.len(), 1);
        tokio::time::sleep(Duration::from_millis(40)).await;

        cache.lookup("ns2.example.net").await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.entries.contains_key("ns2.example.net"));
        assert!(!cache.entries.contains_key("ns1.example.net"));
    }

    #[tokio::test]
    async fn test_transfer_addresses() {
        let cache = ResolverCache::new(resolver(), Duration::from_secs(300));
        let mut domain = Domain::new("example.com.");
        domain.records = vec![
            Record::new("", RecordType::NS, "ns1.example.com."),
            Record::new("", RecordType::NS, "ns1.example.net."),
            Record::new("", RecordType::NS, "ns9.example.org."),
            Record::new("ns1", RecordType::A, "192.0.2.53"),
        ];
        let slaves: Vec<IpAddr> = vec!["203.0.113.53".parse().unwrap()];

        let addresses = transfer_addresses(&domain, &cache, &slaves).await;
        let expected: BTreeSet<IpAddr> = ["192.0.2.53", "198.51.100.1", "203.0.113.53"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(addresses, expected);
    }
}

use super::record::master_text;
use super::{RecordData, RecordType, Result, Soa, ZoneError, constants, hash};
use serde::Serialize;
use std::collections::BTreeMap;

/// All instances of one (owner, type) pair, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Owner relative to the apex; `""` is the apex itself
    pub name: String,
    pub rtype: RecordType,
    pub records: Vec<RecordData>,
}

/// In-memory representation of one zone
///
/// Owner names are kept relative to the origin, the apex being `""`.
/// Names outside the zone stay absolute with their trailing dot. The SOA is
/// held separately from the record sets so there is always exactly one.
#[derive(Debug, Clone)]
pub struct ZoneDocument {
    /// Absolute, lowercase origin with trailing dot
    pub origin: String,
    /// Value of the `$TTL` directive
    pub default_ttl: u32,
    pub soa: Soa,
    rrsets: Vec<RecordSet>,
}

/// Sorted view used for hashing and order-insensitive comparison
#[derive(Serialize, PartialEq)]
struct RecordTree<'a> {
    origin: &'a str,
    default_ttl: u32,
    soa: (&'a str, &'a str, u32, u32, u32, u32, u32),
    records: BTreeMap<&'a str, BTreeMap<&'static str, Vec<&'a RecordData>>>,
}

impl ZoneDocument {
    pub fn new(origin: &str, soa: Soa) -> Self {
        Self {
            origin: absolute_name(origin),
            default_ttl: constants::DEFAULT_TTL,
            soa,
            rrsets: Vec::new(),
        }
    }

    /// Records for an owner/type pair
    pub fn get(&self, name: &str, rtype: RecordType) -> Option<&[RecordData]> {
        let name = self.relativize(name);
        self.rrsets
            .iter()
            .find(|set| set.name == name && set.rtype == rtype)
            .map(|set| set.records.as_slice())
    }

    /// Replace all records of an owner/type pair. An empty list removes the
    /// set. The SOA cannot be set here, use the `soa` field.
    ///
    /// Content is stored in master-file form, see [`master_text`].
    pub fn set(&mut self, name: &str, rtype: RecordType, records: Vec<RecordData>) -> Result<()> {
        if rtype == RecordType::SOA {
            return Err(ZoneError::DuplicateSoa);
        }
        if records.is_empty() {
            self.unset(name, rtype);
            return Ok(());
        }
        let records: Vec<RecordData> = records
            .into_iter()
            .map(|record| to_master_form(rtype, record))
            .collect();

        let name = self.relativize(name);
        match self
            .rrsets
            .iter_mut()
            .find(|set| set.name == name && set.rtype == rtype)
        {
            Some(set) => set.records = records,
            None => self.rrsets.push(RecordSet {
                name,
                rtype,
                records,
            }),
        }
        Ok(())
    }

    /// Append one record, creating the set if needed
    pub fn add(&mut self, name: &str, rtype: RecordType, record: RecordData) -> Result<()> {
        if rtype == RecordType::SOA {
            return Err(ZoneError::DuplicateSoa);
        }
        let record = to_master_form(rtype, record);

        let name = self.relativize(name);
        match self
            .rrsets
            .iter_mut()
            .find(|set| set.name == name && set.rtype == rtype)
        {
            Some(set) => set.records.push(record),
            None => self.rrsets.push(RecordSet {
                name,
                rtype,
                records: vec![record],
            }),
        }
        Ok(())
    }

    /// Remove an owner/type pair, returning its records
    pub fn unset(&mut self, name: &str, rtype: RecordType) -> Option<Vec<RecordData>> {
        let name = self.relativize(name);
        let pos = self
            .rrsets
            .iter()
            .position(|set| set.name == name && set.rtype == rtype)?;
        Some(self.rrsets.remove(pos).records)
    }

    /// Record sets in document order
    pub fn rrsets(&self) -> impl Iterator<Item = &RecordSet> {
        self.rrsets.iter()
    }

    pub fn len(&self) -> usize {
        self.rrsets.iter().map(|set| set.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rrsets.is_empty()
    }

    /// Express `name` relative to the origin.
    ///
    /// Absolute names at or under the apex are stripped (`""` for the apex);
    /// `@` is the apex; other absolute names are kept; relative names are
    /// returned lowercased.
    pub fn relativize(&self, name: &str) -> String {
        relativize(name, &self.origin)
    }

    /// Absolute form of a stored owner name
    pub fn absolute(&self, name: &str) -> String {
        if name.is_empty() || name == "@" {
            self.origin.clone()
        } else if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{}.{}", name, self.origin)
        }
    }

    fn record_tree(&self) -> RecordTree<'_> {
        let mut records: BTreeMap<&str, BTreeMap<&'static str, Vec<&RecordData>>> =
            BTreeMap::new();
        for set in &self.rrsets {
            let mut sorted: Vec<&RecordData> = set.records.iter().collect();
            sorted.sort();
            records
                .entry(set.name.as_str())
                .or_default()
                .entry(set.rtype.as_str())
                .or_default()
                .extend(sorted);
        }

        RecordTree {
            origin: &self.origin,
            default_ttl: self.default_ttl,
            // The serial is left out so that only content changes alter the hash
            soa: (
                &self.soa.primary_ns,
                &self.soa.hostmaster,
                self.soa.refresh,
                self.soa.retry,
                self.soa.expire,
                self.soa.minimum,
                self.soa.ttl,
            ),
            records,
        }
    }

    /// `base36(crc32(sorted-json))` over the zone content, serial excluded
    pub fn content_hash(&self) -> String {
        // Serializing maps of strings and plain structs cannot fail
        let json = serde_json::to_vec(&self.record_tree()).unwrap_or_default();
        hash::content_hash(&json)
    }

    /// Equality ignoring record-set and record insertion order
    pub fn semantically_eq(&self, other: &ZoneDocument) -> bool {
        self.soa == other.soa && self.record_tree() == other.record_tree()
    }
}

fn to_master_form(rtype: RecordType, mut record: RecordData) -> RecordData {
    record.content = master_text(rtype, &record.content);
    record
}

/// Lowercase a name and make sure it ends with a dot
pub fn absolute_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    if name.ends_with('.') {
        name
    } else {
        format!("{}.", name)
    }
}

/// See [`ZoneDocument::relativize`]
pub fn relativize(name: &str, origin: &str) -> String {
    let name = name.trim().to_lowercase();
    if name.is_empty() || name == "@" || name == origin {
        return String::new();
    }
    if !name.ends_with('.') {
        return name;
    }
    match name.strip_suffix(origin) {
        Some(prefix) if prefix.ends_with('.') => prefix.trim_end_matches('.').to_string(),
        _ => name,
    }
}

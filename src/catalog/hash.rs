//! Member naming inside the catalog zone.

use crate::zone::ZoneError;
use ring::digest;
use std::net::IpAddr;

const MAX_LABEL_LEN: usize = 63;
const MAX_WIRE_LEN: usize = 255;

/// DNS wire form of a name: length-prefixed lowercase labels followed by
/// the root label.
///
/// Names that have no wire form (empty or over-long labels, more than 255
/// octets in total) are rejected.
pub fn wire_name(name: &str) -> Result<Vec<u8>, ZoneError> {
    let trimmed = name.trim();
    let relative = trimmed.strip_suffix('.').unwrap_or(trimmed).to_ascii_lowercase();
    let mut wire = Vec::with_capacity(relative.len() + 2);
    if !relative.is_empty() {
        for label in relative.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return Err(ZoneError::InvalidDomainName(name.to_string()));
            }
            wire.push(label.len() as u8);
            wire.extend_from_slice(label.as_bytes());
        }
    }
    wire.push(0);
    if wire.len() > MAX_WIRE_LEN {
        return Err(ZoneError::InvalidDomainName(name.to_string()));
    }
    Ok(wire)
}

/// Member identifier: hex SHA-1 of the wire-form zone name
pub fn catalog_hash(domain: &str) -> Result<String, ZoneError> {
    let digest = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &wire_name(domain)?);
    Ok(hex::encode(digest.as_ref()))
}

/// Owner of a member's PTR, relative to the catalog apex
pub fn member_owner(hash: &str) -> String {
    format!("{}.zones", hash)
}

/// Owner of a member's allow-transfer APL, relative to the catalog apex
pub fn acl_owner(hash: &str) -> String {
    format!("allow-transfer.{}.zones", hash)
}

/// APL rdata permitting exactly the given hosts (`1:a.b.c.d/32`,
/// `2:x::y/128`), or `None` for an empty set
pub fn apl_rdata<'a>(addresses: impl IntoIterator<Item = &'a IpAddr>) -> Option<String> {
    let mut items: Vec<String> = addresses
        .into_iter()
        .map(|ip| match ip {
            IpAddr::V4(v4) => format!("1:{}/32", v4),
            IpAddr::V6(v6) => format!("2:{}/128", v6),
        })
        .collect();
    if items.is_empty() {
        return None;
    }
    items.sort();
    items.dedup();
    Some(items.join(" "))
}

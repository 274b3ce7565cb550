//! Master-file rendering.

use super::{RecordData, RecordType, ZoneDocument};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write;

/// Width of the owner column
const NAME_WIDTH: usize = 30;
/// Width of the TTL column
const TTL_WIDTH: usize = 8;
/// Width of the type column
const TYPE_WIDTH: usize = 6;
/// Indent of SOA continuation lines, lining up with the rdata column
const RDATA_INDENT: usize = NAME_WIDTH + 1 + TTL_WIDTH + 1 + 3 + TYPE_WIDTH + 1;

const HASH_PREFIX: &str = "; content-hash ";

/// Render a zone with the current time in the header
pub fn render(document: &ZoneDocument) -> String {
    render_at(document, Utc::now())
}

/// Render a zone.
///
/// Layout: two header comments (write time, content hash), `$TTL`,
/// `$ORIGIN`, the SOA in parenthesized form, then all other record sets in
/// document order.
pub fn render_at(document: &ZoneDocument, written_at: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(256 + document.len() * 64);

    // Writing into a String cannot fail
    let _ = writeln!(
        out,
        "; zone {} written {}",
        document.origin,
        written_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "{}{}", HASH_PREFIX, document.content_hash());
    let _ = writeln!(out, "$TTL {}", document.default_ttl);
    let _ = writeln!(out, "$ORIGIN {}", document.origin);

    let soa = &document.soa;
    let pad = " ".repeat(RDATA_INDENT);
    let _ = writeln!(
        out,
        "{} {} {} (",
        record_prefix(&document.origin, soa.ttl, RecordType::SOA),
        soa.primary_ns,
        soa.hostmaster
    );
    for (value, label) in [
        (soa.serial, "serial"),
        (soa.refresh, "refresh"),
        (soa.retry, "retry"),
        (soa.expire, "expire"),
        (soa.minimum, "minimum"),
    ] {
        let _ = writeln!(out, "{}{:<12} ; {}", pad, value, label);
    }
    let _ = writeln!(out, "{})", pad);

    for set in document.rrsets() {
        let owner = if set.name.is_empty() {
            document.origin.as_str()
        } else {
            set.name.as_str()
        };
        for record in &set.records {
            let _ = writeln!(out, "{}", record_line(owner, set.rtype, record));
        }
    }

    out
}

fn record_prefix(owner: &str, ttl: u32, rtype: RecordType) -> String {
    format!(
        "{:<name$} {:<ttl_w$} IN {:<type_w$}",
        owner,
        ttl,
        rtype.as_str(),
        name = NAME_WIDTH,
        ttl_w = TTL_WIDTH,
        type_w = TYPE_WIDTH
    )
}

fn record_line(owner: &str, rtype: RecordType, record: &RecordData) -> String {
    format!(
        "{} {}",
        record_prefix(owner, record.ttl, rtype),
        record.rdata()
    )
}

/// Content hash from a rendered file's header, if present
pub fn read_content_hash(text: &str) -> Option<String> {
    text.lines()
        .take(2)
        .find_map(|line| line.strip_prefix(HASH_PREFIX))
        .map(|hash| hash.trim().to_string())
}

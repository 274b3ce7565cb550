use chrono::{NaiveDate, TimeZone, Utc};
use std::io::Write;
use tempfile::NamedTempFile;
use zonesync::zone::{
    RecordData, RecordType, ZoneError, ZoneParser, next_serial_on, read_content_hash, render,
    render_at,
};

const ZONE: &str = r#"
$TTL 1h
$ORIGIN example.org.
@       IN  SOA ns1.example.org. hostmaster.example.org. (
                2024030901 ; serial
                3h         ; refresh
                1h         ; retry
                1w         ; expire
                1h )       ; minimum
        IN  NS  ns1
        IN  NS  ns2.example.org.
        IN  MX  10 mail
ns1         A   192.0.2.53
ns2     300 IN  AAAA 2001:db8::53
mail        A   192.0.2.25
www         CNAME @
_sip._tcp   SRV 5 10 5060 sip.example.org.
@           TXT "v=spf1 mx -all" "second; string"
@           CAA 0 issue "letsencrypt.org"
"#;

#[test]
fn test_full_zone_round_trip() {
    let original = ZoneParser::new().parse(ZONE).unwrap();
    assert_eq!(original.origin, "example.org.");
    assert_eq!(original.default_ttl, 3600);
    assert_eq!(original.soa.serial, 2024030901);
    assert_eq!(original.soa.refresh, 10800);
    assert_eq!(original.soa.expire, 604800);

    let ns = original.get("", RecordType::NS).unwrap();
    assert_eq!(ns.len(), 2);
    assert_eq!(ns[0].content, "ns1");
    assert_eq!(
        original.get("", RecordType::MX).unwrap(),
        &[RecordData::with_priority("mail", 3600, 10)]
    );
    assert_eq!(original.get("ns2", RecordType::AAAA).unwrap()[0].ttl, 300);
    assert_eq!(
        original.get("_sip._tcp", RecordType::SRV).unwrap()[0].rdata(),
        "5 10 5060 sip.example.org."
    );
    assert_eq!(
        original.get("@", RecordType::TXT).unwrap()[0].content,
        r#""v=spf1 mx -all" "second; string""#
    );

    let text = render(&original);
    let reparsed = ZoneParser::with_origin("example.org.").parse(&text).unwrap();
    assert!(original.semantically_eq(&reparsed));
    assert_eq!(original.content_hash(), reparsed.content_hash());
    assert_eq!(read_content_hash(&text), Some(original.content_hash()));
}

#[test]
fn test_rendered_layout() {
    let document = ZoneParser::new().parse(ZONE).unwrap();
    let written = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
    let text = render_at(&document, written);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "; zone example.org. written 2024-03-09T12:00:00Z");
    assert!(lines[1].starts_with("; content-hash "));
    assert_eq!(lines[2], "$TTL 3600");
    assert_eq!(lines[3], "$ORIGIN example.org.");
    assert!(lines[4].starts_with("example.org."));
    assert!(lines[4].ends_with("ns1.example.org. hostmaster.example.org. ("));

    let ns_line = format!("{:<30} {:<8} IN {:<6} {}", "example.org.", 3600, "NS", "ns1");
    assert!(lines.contains(&ns_line.as_str()));
    let aaaa_line = format!("{:<30} {:<8} IN {:<6} {}", "ns2", 300, "AAAA", "2001:db8::53");
    assert!(lines.contains(&aaaa_line.as_str()));
}

#[test]
fn test_rendering_is_stable_apart_from_the_timestamp() {
    let document = ZoneParser::new().parse(ZONE).unwrap();
    let first = render_at(&document, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let second = render_at(&document, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    assert_ne!(first, second);
    assert_eq!(first.lines().skip(1).collect::<Vec<_>>(), second.lines().skip(1).collect::<Vec<_>>());
}

#[test]
fn test_parse_file_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(ZONE.as_bytes()).unwrap();

    let document = ZoneParser::new().parse_file(file.path()).unwrap();
    assert_eq!(document.origin, "example.org.");
    assert_eq!(document.len(), 10);
}

#[test]
fn test_serial_change_keeps_content_hash() {
    let mut document = ZoneParser::new().parse(ZONE).unwrap();
    let before = document.content_hash();
    document.soa.serial = next_serial_on(document.soa.serial, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
    assert_eq!(document.soa.serial, 2024030902);
    assert_eq!(document.content_hash(), before);

    document
        .add("ftp", RecordType::A, RecordData::new("192.0.2.21", 3600))
        .unwrap();
    assert_ne!(document.content_hash(), before);
}

#[test]
fn test_unsupported_kinds_abort_the_parse() {
    let cases = [
        (
            "$ORIGIN example.org.\n@ SOA ns1 host 1 2 3 4 5\nhq LOC 52 22 23.000 N 4 53 32.000 E -2.00m",
            3,
        ),
        ("+www.example.org:192.0.2.1:3600", 1),
        ("$INCLUDE other.zone\n", 1),
        ("$ORIGIN example.org.\n@ SOA ns1 host 1 2 3 4 5\n@ CH TXT \"chaos\"", 3),
    ];

    for (text, line) in cases {
        match ZoneParser::new().parse(text) {
            Err(ZoneError::UnsupportedRecordKind { line: at, .. }) => assert_eq!(at, line, "{}", text),
            other => panic!("expected unsupported kind for {:?}, got {:?}", text, other),
        }
    }
}

#[test]
fn test_catalog_style_records_round_trip() {
    let text = "$ORIGIN catalog.invalid.\n\
                @ 0 IN SOA invalid. invalid. 7 3600 600 2419200 3600\n\
                @ IN NS invalid.\n\
                version IN TXT \"2\"\n\
                c5e4b4da1e5a620ddaa3635e55c3732a5b49c7f4.zones IN PTR example.com.\n\
                allow-transfer.c5e4b4da1e5a620ddaa3635e55c3732a5b49c7f4.zones IN APL 1:192.0.2.53/32 2:2001:db8::53/128\n";
    let document = ZoneParser::new().parse(text).unwrap();
    assert_eq!(document.soa.ttl, 0);

    let rendered = render(&document);
    let again = ZoneParser::new().parse(&rendered).unwrap();
    assert!(document.semantically_eq(&again));
    assert_eq!(
        again
            .get(
                "allow-transfer.c5e4b4da1e5a620ddaa3635e55c3732a5b49c7f4.zones",
                RecordType::APL
            )
            .unwrap()[0]
            .content,
        "1:192.0.2.53/32 2:2001:db8::53/128"
    );
}

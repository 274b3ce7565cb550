use super::document::{absolute_name, relativize};
use super::{RecordData, RecordType, Result, Soa, ZoneDocument, ZoneError, constants};
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// First characters of TinyDNS `data` lines (`+fqdn:ip:ttl:timestamp:lo`)
const TINYDNS_PREFIXES: &[char] = &[
    '.', '&', '=', '+', '@', '\'', '^', 'C', 'Z', ':', '%', '-', '6', 'S', '3',
];

/// A record line before owner names are made relative to the apex
struct PendingRecord {
    owner: String,
    rtype: RecordType,
    data: RecordData,
}

/// BIND master-file parser
pub struct ZoneParser {
    /// Apex of the zone being parsed, when known up front
    zone_origin: Option<String>,
    /// Current `$ORIGIN`, absolute
    current_origin: Option<String>,
    /// Last `$TTL` seen
    current_ttl: Option<u32>,
    /// Owner of the previous record, for lines starting with whitespace
    last_owner: Option<String>,
    /// Line number for error reporting
    line_number: usize,
}

impl ZoneParser {
    /// Create a parser that learns the apex from the first `$ORIGIN` or the
    /// SOA owner
    pub fn new() -> Self {
        Self {
            zone_origin: None,
            current_origin: None,
            current_ttl: None,
            last_owner: None,
            line_number: 0,
        }
    }

    /// Create a parser for a zone whose apex is already known
    pub fn with_origin(origin: &str) -> Self {
        let origin = absolute_name(origin);
        Self {
            zone_origin: Some(origin.clone()),
            current_origin: Some(origin),
            ..Self::new()
        }
    }

    /// Parse a zone file from path
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ZoneDocument> {
        let contents = fs::read_to_string(path.as_ref())?;
        if contents.len() > constants::MAX_ZONE_FILE_SIZE {
            return Err(ZoneError::Io(format!(
                "{} exceeds maximum zone file size",
                path.as_ref().display()
            )));
        }
        self.parse(&contents)
    }

    /// Parse zone file contents.
    ///
    /// Any error aborts the whole parse; no partial document is returned.
    pub fn parse(&mut self, contents: &str) -> Result<ZoneDocument> {
        let (soa, pending) = self.parse_lines(contents)?;

        let (soa_owner, soa) = soa.ok_or(ZoneError::MissingSoa)?;
        let apex = self.zone_origin.clone().unwrap_or(soa_owner);

        let mut document = ZoneDocument::new(&apex, soa);
        document.default_ttl = self.current_ttl.unwrap_or(constants::DEFAULT_TTL);

        for record in pending {
            let name = relativize(&record.owner, &document.origin);
            document.add(&name, record.rtype, record.data)?;
        }

        debug!(
            "Parsed zone {} with {} records",
            document.origin,
            document.len()
        );

        Ok(document)
    }

    /// Parse a fragment of record lines that is not a full zone, such as
    /// the output of DNSSEC tools. Owners are returned absolute; an SOA in
    /// the fragment is rejected.
    pub fn parse_records(&mut self, contents: &str) -> Result<Vec<(String, RecordType, RecordData)>> {
        let (soa, pending) = self.parse_lines(contents)?;
        if soa.is_some() {
            return Err(ZoneError::DuplicateSoa);
        }
        Ok(pending
            .into_iter()
            .map(|record| (record.owner, record.rtype, record.data))
            .collect())
    }

    #[allow(clippy::type_complexity)]
    fn parse_lines(
        &mut self,
        contents: &str,
    ) -> Result<(Option<(String, Soa)>, Vec<PendingRecord>)> {
        self.current_origin = self.zone_origin.clone();
        self.current_ttl = None;
        self.last_owner = None;
        self.line_number = 0;

        let lines: Vec<&str> = contents.lines().collect();
        let mut soa: Option<(String, Soa)> = None;
        let mut pending = Vec::new();
        let mut index = 0;

        while index < lines.len() {
            self.line_number = index + 1;
            let start_line = self.line_number;
            let raw = lines[index];
            index += 1;

            let stripped = strip_comment(raw);
            if stripped.trim().is_empty() {
                continue;
            }

            // Join parenthesized continuations into one logical line
            let mut logical = stripped.to_string();
            let mut depth = paren_depth(stripped);
            while depth > 0 {
                if index >= lines.len() {
                    return Err(self.parse_error(
                        start_line,
                        format!("Unclosed parentheses starting at line {}", start_line),
                    ));
                }
                let next = strip_comment(lines[index]);
                index += 1;
                self.line_number = index;
                depth += paren_depth(next);
                logical.push(' ');
                logical.push_str(next.trim());
            }

            trace!("Parsing line {}: {}", start_line, logical);

            if logical.trim_start().starts_with('$') {
                self.parse_directive(&logical, start_line)?;
                continue;
            }

            let indented = logical.starts_with(' ') || logical.starts_with('\t');
            let mut tokens = tokenize(&logical);
            if tokens.is_empty() {
                continue;
            }

            if !indented && tokens[0].contains(':') {
                let kind = match tokens[0].chars().next() {
                    Some(c) if TINYDNS_PREFIXES.contains(&c) => {
                        format!("TinyDNS data line '{}'", c)
                    }
                    _ => format!("owner name '{}'", tokens[0]),
                };
                return Err(ZoneError::UnsupportedRecordKind {
                    line: start_line,
                    kind,
                });
            }

            let owner = if indented {
                self.last_owner.clone().ok_or_else(|| {
                    self.parse_error(start_line, "Record without owner name".to_string())
                })?
            } else {
                let name = tokens.remove(0);
                self.qualify(&name, start_line)?
            };
            self.last_owner = Some(owner.clone());

            let (ttl, rtype, mut rdata) = self.parse_fields(tokens, start_line)?;

            if rtype == RecordType::SOA {
                // Unparenthesized SOA split over several lines: keep reading
                // until the five numeric fields are present
                while rdata.len() < 7 && index < lines.len() {
                    let next = strip_comment(lines[index]);
                    index += 1;
                    self.line_number = index;
                    rdata.extend(tokenize(next));
                }
                if soa.is_some() {
                    return Err(ZoneError::DuplicateSoa);
                }
                let record = self.parse_soa(&rdata, ttl, start_line)?;
                if self.zone_origin.is_none() {
                    self.zone_origin = Some(owner.clone());
                }
                soa = Some((owner, record));
                continue;
            }

            let data = self.parse_rdata(rtype, rdata, ttl, start_line)?;
            pending.push(PendingRecord { owner, rtype, data });
        }

        Ok((soa, pending))
    }

    fn parse_error(&self, line: usize, message: String) -> ZoneError {
        ZoneError::Parse { line, message }
    }

    /// Handle `$TTL` and `$ORIGIN`; anything else is refused
    fn parse_directive(&mut self, line: &str, line_number: usize) -> Result<()> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let directive = parts[0].to_uppercase();

        match directive.as_str() {
            "$ORIGIN" => {
                let name = parts.get(1).ok_or_else(|| {
                    self.parse_error(line_number, "$ORIGIN requires domain name".to_string())
                })?;
                let origin = self.qualify(name, line_number)?;
                if self.zone_origin.is_none() {
                    self.zone_origin = Some(origin.clone());
                }
                debug!("Set origin to: {}", origin);
                self.current_origin = Some(origin);
            }
            "$TTL" => {
                let value = parts.get(1).ok_or_else(|| {
                    self.parse_error(line_number, "$TTL requires value".to_string())
                })?;
                let ttl = parse_ttl(value)?;
                debug!("Set default TTL to: {}", ttl);
                self.current_ttl = Some(ttl);
            }
            _ => {
                return Err(ZoneError::UnsupportedRecordKind {
                    line: line_number,
                    kind: format!("directive {}", parts[0]),
                });
            }
        }

        Ok(())
    }

    /// Make a name absolute against the current origin
    fn qualify(&self, name: &str, line_number: usize) -> Result<String> {
        if name.ends_with('.') {
            return Ok(name.to_lowercase());
        }

        let origin = self.current_origin.as_ref().ok_or_else(|| {
            self.parse_error(
                line_number,
                format!("Relative name '{}' without $ORIGIN", name),
            )
        })?;

        if name == "@" {
            Ok(origin.clone())
        } else {
            Ok(format!("{}.{}", name.to_lowercase(), origin))
        }
    }

    /// Split `[ttl] [class] type rdata...`
    fn parse_fields(
        &self,
        tokens: Vec<String>,
        line_number: usize,
    ) -> Result<(u32, RecordType, Vec<String>)> {
        let mut ttl = None;
        let mut tokens = tokens.into_iter();

        let rtype = loop {
            let field = tokens.next().ok_or_else(|| {
                self.parse_error(line_number, "Missing record type".to_string())
            })?;

            if ttl.is_none() && field.starts_with(|c: char| c.is_ascii_digit()) {
                ttl = Some(parse_ttl(&field)?);
                continue;
            }

            match field.to_uppercase().as_str() {
                "IN" => continue,
                "CH" | "HS" | "CS" => {
                    return Err(ZoneError::UnsupportedRecordKind {
                        line: line_number,
                        kind: format!("class {}", field),
                    });
                }
                _ => {}
            }

            break RecordType::from_name(&field).ok_or_else(|| {
                ZoneError::UnsupportedRecordKind {
                    line: line_number,
                    kind: format!("record type {}", field),
                }
            })?;
        };

        let ttl = ttl
            .or(self.current_ttl)
            .unwrap_or(constants::DEFAULT_TTL);

        Ok((ttl, rtype, tokens.collect()))
    }

    fn parse_soa(&self, rdata: &[String], ttl: u32, line_number: usize) -> Result<Soa> {
        if rdata.len() < 7 {
            return Err(self.parse_error(
                line_number,
                format!("SOA record requires 7 fields, got {}", rdata.len()),
            ));
        }

        let serial = rdata[2].parse::<u32>().map_err(|_| {
            self.parse_error(line_number, format!("Invalid SOA serial: {}", rdata[2]))
        })?;

        Ok(Soa {
            primary_ns: rdata[0].to_lowercase(),
            hostmaster: rdata[1].to_lowercase(),
            serial,
            refresh: parse_ttl(&rdata[3])?,
            retry: parse_ttl(&rdata[4])?,
            expire: parse_ttl(&rdata[5])?,
            minimum: parse_ttl(&rdata[6])?,
            ttl,
        })
    }

    fn parse_rdata(
        &self,
        rtype: RecordType,
        mut rdata: Vec<String>,
        ttl: u32,
        line_number: usize,
    ) -> Result<RecordData> {
        let priority = if rtype.has_priority() {
            if rdata.is_empty() {
                return Err(self.parse_error(line_number, "Missing priority".to_string()));
            }
            let field = rdata.remove(0);
            let priority = field.parse::<u16>().map_err(|_| {
                self.parse_error(line_number, format!("Invalid {} priority: {}", rtype, field))
            })?;
            Some(priority)
        } else {
            None
        };

        if rdata.is_empty() {
            return Err(self.parse_error(line_number, "Missing RDATA".to_string()));
        }

        Ok(RecordData {
            content: rdata.join(" "),
            ttl,
            priority,
        })
    }
}

impl Default for ZoneParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a TTL value (supports suffixes like 1h, 30m, 1w2d)
pub fn parse_ttl(s: &str) -> Result<u32> {
    let lower = s.to_lowercase();
    if let Ok(seconds) = lower.parse::<u32>() {
        return Ok(seconds);
    }

    let mut total: u32 = 0;
    let mut number = String::new();
    for ch in lower.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let unit = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            'w' => 604800,
            _ => return Err(ZoneError::InvalidTtl(s.to_string())),
        };
        let value = number
            .parse::<u32>()
            .map_err(|_| ZoneError::InvalidTtl(s.to_string()))?;
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| ZoneError::InvalidTtl(s.to_string()))?;
        number.clear();
    }

    if !number.is_empty() {
        return Err(ZoneError::InvalidTtl(s.to_string()));
    }
    Ok(total)
}

/// Best-effort SOA serial of master-file text that may not parse as a
/// whole: the third rdata field after the first `SOA` token
pub fn scan_soa_serial(contents: &str) -> Option<u32> {
    let mut tokens = contents
        .lines()
        .flat_map(|line| tokenize(strip_comment(line)))
        .skip_while(|token| !token.eq_ignore_ascii_case("SOA"));
    tokens.next()?;
    tokens.nth(2)?.parse().ok()
}

/// Cut a `;` comment, ignoring semicolons inside quoted strings
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (pos, ch) in line.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => return &line[..pos],
            _ => {}
        }
    }
    line
}

/// Net count of unquoted opening parentheses
fn paren_depth(line: &str) -> i32 {
    let mut depth = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in line.chars() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Split on whitespace, keeping quoted strings whole and dropping grouping
/// parentheses
fn tokenize(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in line.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' | ')' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ttl() {
        assert_eq!(parse_ttl("300").unwrap(), 300);
        assert_eq!(parse_ttl("5m").unwrap(), 300);
        assert_eq!(parse_ttl("1h").unwrap(), 3600);
        assert_eq!(parse_ttl("1d").unwrap(), 86400);
        assert_eq!(parse_ttl("1w").unwrap(), 604800);
        assert_eq!(parse_ttl("1h30m").unwrap(), 5400);
        assert!(parse_ttl("h1").is_err());
        assert!(parse_ttl("10x").is_err());
    }

    #[test]
    fn test_strip_comment_respects_quotes() {
        assert_eq!(strip_comment("www A 192.0.2.1 ; web"), "www A 192.0.2.1 ");
        assert_eq!(
            strip_comment(r#"@ TXT "a;b" ; note"#),
            r#"@ TXT "a;b" "#
        );
    }

    #[test]
    fn test_scan_soa_serial() {
        let text = "; header\n$ORIGIN example.com.\n\
                    @ 3600 IN SOA ns1.example.com. admin.example.com. (\n\
                    \t2024030907 ; serial\n\
                    \t3600 900 604800 86400 )\n\
                    bad IN LOC 52 22 N\n";
        assert!(ZoneParser::new().parse(text).is_err());
        assert_eq!(scan_soa_serial(text), Some(2024030907));
        assert_eq!(scan_soa_serial("@ IN NS ns1.example.com.\n"), None);
        assert_eq!(scan_soa_serial("@ IN SOA ns1 admin soon 1 2 3 4\n"), None);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize(r#"@ IN TXT "hello world" "x""#),
            vec!["@", "IN", "TXT", "\"hello world\"", "\"x\""]
        );
        assert_eq!(tokenize("( 1 2 )"), vec!["1", "2"]);
    }

    #[test]
    fn test_simple_zone_file() {
        let zone_content = r#"
$ORIGIN example.com.
$TTL 3600

@   IN  SOA ns1.example.com. admin.example.com. 2024010101 3600 900 604800 86400

@       IN  NS  ns1.example.com.
@       IN  NS  ns2.example.com.

@       IN  A   192.0.2.1
www     IN  A   192.0.2.2
mail    300 IN  A   192.0.2.3

@       IN  MX  10 mail.example.com.
        "#;

        let mut parser = ZoneParser::new();
        let zone = parser.parse(zone_content).unwrap();

        assert_eq!(zone.origin, "example.com.");
        assert_eq!(zone.default_ttl, 3600);
        assert_eq!(zone.soa.serial, 2024010101);
        assert_eq!(zone.get("", RecordType::NS).unwrap().len(), 2);
        assert_eq!(zone.get("mail", RecordType::A).unwrap()[0].ttl, 300);
        assert_eq!(zone.get("www", RecordType::A).unwrap()[0].ttl, 3600);

        let mx = &zone.get("", RecordType::MX).unwrap()[0];
        assert_eq!(mx.priority, Some(10));
        assert_eq!(mx.content, "mail.example.com.");
    }

    #[test]
    fn test_multi_line_soa_record() {
        let zone_content = r#"
$ORIGIN example.com.
$TTL 3600

@   IN  SOA ns1.example.com. admin.example.com. (
    2024010101          ; Serial
    3600                ; Refresh
    900                 ; Retry
    604800              ; Expire
    86400               ; Minimum TTL
)

@       IN  NS  ns1.example.com.
        "#;

        let mut parser = ZoneParser::new();
        let zone = parser.parse(zone_content).unwrap();

        assert_eq!(zone.soa.serial, 2024010101);
        assert_eq!(zone.soa.minimum, 86400);
        assert_eq!(zone.soa.hostmaster, "admin.example.com.");
    }

    #[test]
    fn test_soa_continuation_without_parentheses() {
        let zone_content = "$ORIGIN example.com.\n\
            @ 3600 IN SOA ns1.example.com. admin.example.com. 2024010101\n\
            \t3600 900\n\
            \t604800 86400\n\
            @ IN NS ns1.example.com.\n";

        let mut parser = ZoneParser::new();
        let zone = parser.parse(zone_content).unwrap();
        assert_eq!(zone.soa.retry, 900);
        assert_eq!(zone.soa.minimum, 86400);
        assert_eq!(zone.get("", RecordType::NS).unwrap().len(), 1);
    }

    #[test]
    fn test_absolute_names_are_relativized() {
        let zone_content = r#"
$TTL 300
example.com. IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
example.com. IN NS ns1.example.com.
www.example.com. IN A 192.0.2.1
$ORIGIN sub.example.com.
host IN A 192.0.2.2
        "#;

        let mut parser = ZoneParser::new();
        let zone = parser.parse(zone_content).unwrap();
        assert_eq!(zone.origin, "example.com.");
        assert!(zone.get("", RecordType::NS).is_some());
        assert!(zone.get("www", RecordType::A).is_some());
        assert!(zone.get("host.sub", RecordType::A).is_some());
    }

    #[test]
    fn test_inherited_owner() {
        let zone_content = r#"
$ORIGIN example.com.
@ IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
www IN A 192.0.2.1
    IN AAAA 2001:db8::1
        "#;

        let mut parser = ZoneParser::new();
        let zone = parser.parse(zone_content).unwrap();
        assert_eq!(
            zone.get("www", RecordType::AAAA).unwrap()[0].content,
            "2001:db8::1"
        );
    }

    #[test]
    fn test_unclosed_parentheses_error() {
        let zone_content = r#"
$ORIGIN example.com.

@   IN  SOA ns1.example.com. admin.example.com. (
    2024010101
    ; Missing closing parenthesis
        "#;

        let mut parser = ZoneParser::new();
        let error = parser.parse(zone_content).unwrap_err();
        assert!(error.to_string().contains("Unclosed parentheses"));
    }

    #[test]
    fn test_loc_record_rejected() {
        let zone_content = r#"
$ORIGIN example.com.
@ IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
@ IN LOC 52 22 23.000 N 4 53 32.000 E -2.00m 0.00m 10000m 10m
        "#;

        let mut parser = ZoneParser::new();
        match parser.parse(zone_content) {
            Err(ZoneError::UnsupportedRecordKind { line, kind }) => {
                assert_eq!(line, 4);
                assert!(kind.contains("LOC"));
            }
            other => panic!("expected UnsupportedRecordKind, got {:?}", other),
        }
    }

    #[test]
    fn test_tinydns_line_rejected() {
        let zone_content = r#"
$ORIGIN example.com.
@ IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
+www.example.com:192.0.2.1:300:4000000062a1b2c3:lo
        "#;

        let mut parser = ZoneParser::new();
        assert!(matches!(
            parser.parse(zone_content),
            Err(ZoneError::UnsupportedRecordKind { .. })
        ));
    }

    #[test]
    fn test_unknown_directive_rejected() {
        let zone_content = r#"
$ORIGIN example.com.
$INCLUDE other.zone
@ IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
        "#;

        let mut parser = ZoneParser::new();
        assert!(matches!(
            parser.parse(zone_content),
            Err(ZoneError::UnsupportedRecordKind { line: 3, .. })
        ));
    }

    #[test]
    fn test_missing_soa() {
        let mut parser = ZoneParser::new();
        let result = parser.parse("$ORIGIN example.com.\n@ IN NS ns1.example.com.\n");
        assert_eq!(result.unwrap_err(), ZoneError::MissingSoa);
    }

    #[test]
    fn test_duplicate_soa() {
        let zone_content = r#"
$ORIGIN example.com.
@ IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
@ IN SOA ns1.example.com. admin.example.com. 2 2 3 4 5
        "#;

        let mut parser = ZoneParser::new();
        assert_eq!(parser.parse(zone_content).unwrap_err(), ZoneError::DuplicateSoa);
    }

    #[test]
    fn test_quoted_txt_kept_whole() {
        let zone_content = r#"
$ORIGIN example.com.
@ IN SOA ns1.example.com. admin.example.com. 1 2 3 4 5
@ IN TXT "v=spf1 ip4:192.0.2.0/24 -all" ; trailing comment
long IN TXT ( "part one "
              "part two" )
        "#;

        let mut parser = ZoneParser::new();
        let zone = parser.parse(zone_content).unwrap();
        assert_eq!(
            zone.get("", RecordType::TXT).unwrap()[0].content,
            "\"v=spf1 ip4:192.0.2.0/24 -all\""
        );
        assert_eq!(
            zone.get("long", RecordType::TXT).unwrap()[0].content,
            "\"part one \" \"part two\""
        );
    }

    #[test]
    fn test_parse_record_fragment() {
        let text = "; This is a key-signing key, keyid 12345, for example.com.\n\
                    example.com. 3600 IN DNSKEY 257 3 13 AwEAAa==\n\
                    example.com. IN DS 12345 13 2 ABCDEF\n";

        let records = ZoneParser::new().parse_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "example.com.");
        assert_eq!(records[0].1, RecordType::DNSKEY);
        assert_eq!(records[0].2.content, "257 3 13 AwEAAa==");
        assert_eq!(records[1].1, RecordType::DS);
        assert_eq!(records[1].2.content, "12345 13 2 ABCDEF");
    }
}

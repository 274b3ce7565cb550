use serde::{Deserialize, Serialize};
use std::fmt;

/// Record types the codec reads and writes.
///
/// `LOC` is intentionally absent: location records are rejected by the
/// parser rather than carried as opaque text.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    A,
    AAAA,
    APL,
    CAA,
    CDNSKEY,
    CDS,
    CNAME,
    DNAME,
    DNSKEY,
    DS,
    HINFO,
    MX,
    NAPTR,
    NS,
    PTR,
    SOA,
    SPF,
    SRV,
    SSHFP,
    TLSA,
    TXT,
}

impl RecordType {
    /// Look up a type by its mnemonic (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let rtype = match name.to_ascii_uppercase().as_str() {
            "A" => Self::A,
            "AAAA" => Self::AAAA,
            "APL" => Self::APL,
            "CAA" => Self::CAA,
            "CDNSKEY" => Self::CDNSKEY,
            "CDS" => Self::CDS,
            "CNAME" => Self::CNAME,
            "DNAME" => Self::DNAME,
            "DNSKEY" => Self::DNSKEY,
            "DS" => Self::DS,
            "HINFO" => Self::HINFO,
            "MX" => Self::MX,
            "NAPTR" => Self::NAPTR,
            "NS" => Self::NS,
            "PTR" => Self::PTR,
            "SOA" => Self::SOA,
            "SPF" => Self::SPF,
            "SRV" => Self::SRV,
            "SSHFP" => Self::SSHFP,
            "TLSA" => Self::TLSA,
            "TXT" => Self::TXT,
            _ => return None,
        };
        Some(rtype)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::APL => "APL",
            Self::CAA => "CAA",
            Self::CDNSKEY => "CDNSKEY",
            Self::CDS => "CDS",
            Self::CNAME => "CNAME",
            Self::DNAME => "DNAME",
            Self::DNSKEY => "DNSKEY",
            Self::DS => "DS",
            Self::HINFO => "HINFO",
            Self::MX => "MX",
            Self::NAPTR => "NAPTR",
            Self::NS => "NS",
            Self::PTR => "PTR",
            Self::SOA => "SOA",
            Self::SPF => "SPF",
            Self::SRV => "SRV",
            Self::SSHFP => "SSHFP",
            Self::TLSA => "TLSA",
            Self::TXT => "TXT",
        }
    }

    /// Types whose first rdata field is a numeric priority kept apart from
    /// the content
    pub fn has_priority(&self) -> bool {
        matches!(self, Self::MX | Self::SRV)
    }

    /// Types whose rdata is a sequence of character strings
    pub fn is_text(&self) -> bool {
        matches!(self, Self::TXT | Self::SPF)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record instance inside a record set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordData {
    /// Address or content text exactly as written after the type (and
    /// priority, for MX/SRV)
    pub content: String,
    /// Time to live in seconds
    pub ttl: u32,
    /// MX preference or SRV priority
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

impl RecordData {
    pub fn new(content: impl Into<String>, ttl: u32) -> Self {
        Self {
            content: content.into(),
            ttl,
            priority: None,
        }
    }

    pub fn with_priority(content: impl Into<String>, ttl: u32, priority: u16) -> Self {
        Self {
            content: content.into(),
            ttl,
            priority: Some(priority),
        }
    }

    /// Rdata text as it appears in a master file
    pub fn rdata(&self) -> String {
        match self.priority {
            Some(priority) => format!("{} {}", priority, self.content),
            None => self.content.clone(),
        }
    }
}

/// Master-file form of record content.
///
/// Text types become one or more quoted strings: content that is not
/// already a well-formed sequence of quoted strings is wrapped in quotes
/// with `"` and `\` escaped. Other types get `;`, `(`, `)` and unbalanced
/// `"` backslash-escaped outside quoted sections. Line breaks and other
/// control characters become `\DDD` escapes and unquoted whitespace runs
/// collapse to one space. Applying this twice changes nothing.
pub fn master_text(rtype: RecordType, content: &str) -> String {
    let content = content.trim();
    if rtype.is_text() {
        if is_quoted_strings(content) {
            collapse_whitespace(content)
        } else {
            quote(content)
        }
    } else {
        collapse_whitespace(&escape_unquoted(content))
    }
}

fn is_line_break(ch: char) -> bool {
    ch == '\n' || ch == '\r'
}

fn push_decimal_escape(out: &mut String, ch: char) {
    out.push_str(&format!("\\{:03}", ch as u32));
}

/// `"..." "..."` with nothing but whitespace between the strings
fn is_quoted_strings(text: &str) -> bool {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut seen = false;
    for ch in text.chars() {
        if is_line_break(ch) {
            return false;
        }
        if in_quotes {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_quotes = false,
                _ => {}
            }
        } else if ch == '"' {
            in_quotes = true;
            seen = true;
        } else if !ch.is_whitespace() {
            return false;
        }
    }
    seen && !in_quotes
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_control() && c != '\t' => push_decimal_escape(&mut out, c),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Whether the unescaped `"` in `text` pair up
fn quotes_balanced(text: &str) -> bool {
    let mut escaped = false;
    let mut count = 0;
    for ch in text.chars() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => count += 1,
            _ => {}
        }
    }
    count % 2 == 0
}

fn escape_unquoted(text: &str) -> String {
    let balanced = quotes_balanced(text);
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) if next.is_control() && next != '\t' => {
                    push_decimal_escape(&mut out, next)
                }
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push_str("\\\\"),
            },
            '"' if balanced => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '"' => out.push_str("\\\""),
            ';' | '(' | ')' if !in_quotes => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_control() && c != '\t' => push_decimal_escape(&mut out, c),
            c => out.push(c),
        }
    }
    out
}

/// Collapse whitespace outside quoted strings to single spaces
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut escaped = false;
    let mut pending_space = false;
    for ch in text.chars() {
        if !in_quotes && !escaped && ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            _ => {}
        }
        out.push(ch);
    }
    out
}

/// Start of authority
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Soa {
    pub primary_ns: String,
    pub hostmaster: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
    pub ttl: u32,
}

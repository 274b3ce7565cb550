use thiserror::Error;

/// Zone-related errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ZoneError {
    /// Malformed master-file text
    #[error("Zone parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Syntax this codec deliberately does not accept (LOC, TinyDNS data
    /// lines, unknown directives, unknown record types)
    #[error("Unsupported record kind at line {line}: {kind}")]
    UnsupportedRecordKind { line: usize, kind: String },

    #[error("Zone missing required SOA record")]
    MissingSoa,

    #[error("Zone contains duplicate SOA records")]
    DuplicateSoa,

    #[error("Invalid TTL value: {0}")]
    InvalidTtl(String),

    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ZoneError {
    fn from(err: std::io::Error) -> Self {
        ZoneError::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZoneError>;

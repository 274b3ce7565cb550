pub mod document;
pub mod errors;
pub mod hash;
pub mod parser;
pub mod record;
pub mod render;
pub mod serial;

pub use document::{RecordSet, ZoneDocument, absolute_name};
pub use errors::{Result, ZoneError};
pub use parser::{ZoneParser, parse_ttl, scan_soa_serial};
pub use record::{RecordData, RecordType, Soa};
pub use render::{read_content_hash, render, render_at};
pub use serial::{increment_serial, next_serial, next_serial_on};

/// Zone constants
pub mod constants {
    /// Default TTL if not specified (1 hour)
    pub const DEFAULT_TTL: u32 = 3600;

    /// Maximum zone file size (10MB)
    pub const MAX_ZONE_FILE_SIZE: usize = 10 * 1024 * 1024;
}

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zone-signing key flags
pub const ZSK_FLAGS: u16 = 256;
/// Key-signing key flags (SEP bit set)
pub const KSK_FLAGS: u16 = 257;

/// Timestamp format of BIND `.private` metadata (`20240309120000`)
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Lifecycle metadata fields of a BIND `.private` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDateField {
    Publish,
    Activate,
    Revoke,
    Inactive,
    Delete,
    SyncPublish,
    SyncDelete,
}

impl KeyDateField {
    pub const ALL: [KeyDateField; 7] = [
        KeyDateField::Publish,
        KeyDateField::Activate,
        KeyDateField::Revoke,
        KeyDateField::Inactive,
        KeyDateField::Delete,
        KeyDateField::SyncPublish,
        KeyDateField::SyncDelete,
    ];

    /// Field name as written in the file
    pub fn label(&self) -> &'static str {
        match self {
            Self::Publish => "Publish",
            Self::Activate => "Activate",
            Self::Revoke => "Revoke",
            Self::Inactive => "Inactive",
            Self::Delete => "Delete",
            Self::SyncPublish => "SyncPublish",
            Self::SyncDelete => "SyncDelete",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.label().eq_ignore_ascii_case(label.trim()))
    }
}

/// Lifecycle timestamps of a key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyDates {
    pub publish: Option<DateTime<Utc>>,
    pub activate: Option<DateTime<Utc>>,
    pub revoke: Option<DateTime<Utc>>,
    pub inactive: Option<DateTime<Utc>>,
    pub delete: Option<DateTime<Utc>>,
    pub sync_publish: Option<DateTime<Utc>>,
    pub sync_delete: Option<DateTime<Utc>>,
}

impl KeyDates {
    pub fn get(&self, field: KeyDateField) -> Option<DateTime<Utc>> {
        match field {
            KeyDateField::Publish => self.publish,
            KeyDateField::Activate => self.activate,
            KeyDateField::Revoke => self.revoke,
            KeyDateField::Inactive => self.inactive,
            KeyDateField::Delete => self.delete,
            KeyDateField::SyncPublish => self.sync_publish,
            KeyDateField::SyncDelete => self.sync_delete,
        }
    }

    pub fn set(&mut self, field: KeyDateField, value: DateTime<Utc>) {
        let slot = match field {
            KeyDateField::Publish => &mut self.publish,
            KeyDateField::Activate => &mut self.activate,
            KeyDateField::Revoke => &mut self.revoke,
            KeyDateField::Inactive => &mut self.inactive,
            KeyDateField::Delete => &mut self.delete,
            KeyDateField::SyncPublish => &mut self.sync_publish,
            KeyDateField::SyncDelete => &mut self.sync_delete,
        };
        *slot = Some(value);
    }

    /// Metadata lines in file order
    pub fn lines(&self) -> Vec<String> {
        KeyDateField::ALL
            .into_iter()
            .filter_map(|field| {
                self.get(field)
                    .map(|at| format!("{}: {}", field.label(), at.format(TIMESTAMP_FORMAT)))
            })
            .collect()
    }
}

/// Parse a `.private` timestamp
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A DNSSEC key pair owned by one domain.
///
/// `key_id`, `flags` and `algorithm` are derived from the public key on
/// import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneKeyRecord {
    pub key_id: u16,
    pub flags: u16,
    pub algorithm: u8,
    /// `.private` contents without the lifecycle lines
    pub private_key: String,
    /// `.key` contents
    pub public_key: String,
    /// DS records derived from the public key
    #[serde(default)]
    pub ds_records: Vec<String>,
    #[serde(default)]
    pub dates: KeyDates,
}

impl ZoneKeyRecord {
    pub fn is_ksk(&self) -> bool {
        self.flags == KSK_FLAGS
    }

    /// BIND key file base name: `K{domain}.+{alg}+{keyid}`
    pub fn file_stem(&self, domain: &str) -> String {
        format!(
            "K{}+{:03}+{:05}",
            crate::zone::absolute_name(domain),
            self.algorithm,
            self.key_id
        )
    }

    /// Full `.private` text: payload followed by lifecycle metadata
    pub fn private_file_text(&self) -> String {
        let mut text = self.private_key.trim_end().to_string();
        for line in self.dates.lines() {
            text.push('\n');
            text.push_str(&line);
        }
        text.push('\n');
        text
    }
}

//! DNSSEC key material: generation through external tools, import, and
//! the key files next to the zones.

pub mod algorithm;
pub mod key;
pub mod key_tag;
pub mod provisioner;
pub mod tools;

pub use algorithm::KeyAlgorithm;
pub use key::{KSK_FLAGS, KeyDateField, KeyDates, ZSK_FLAGS, ZoneKeyRecord};
pub use key_tag::{calculate_key_tag, key_tag_from_rdata};
pub use provisioner::{KeyPolicy, KeyProvisioner, MaterializeOutcome};
pub use tools::{BindDnssecTools, DnssecTooling, GeneratedKeyFiles, KeySpec};

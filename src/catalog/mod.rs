//! The catalog zone listing every served zone for the secondaries.

pub mod hash;
pub mod manager;

pub use hash::{apl_rdata, catalog_hash, wire_name};
pub use manager::{CatalogManager, CatalogOutcome};

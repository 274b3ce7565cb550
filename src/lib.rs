pub mod catalog;
pub mod command;
pub mod config;
pub mod context;
pub mod deploy;
pub mod dnssec;
pub mod domain;
pub mod error;
pub mod fsutil;
pub mod jobs;
pub mod lock;
pub mod resolve;
pub mod zone;

pub use config::SyncConfig;
pub use context::SyncContext;
pub use error::{Result, SyncError};

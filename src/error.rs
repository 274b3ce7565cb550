use crate::zone::ZoneError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Invalid path for {field}: {value}")]
    InvalidPath { field: &'static str, value: String },

    #[error("Invalid catalog zone name: {0}")]
    InvalidCatalogZone(String),

    #[error("Invalid {name} command template: {message}")]
    InvalidCommandTemplate { name: &'static str, message: String },

    #[error("Invalid slave IP address: {0}")]
    InvalidSlaveIp(String),

    #[error("Invalid worker count: {0}")]
    InvalidWorkers(String),

    #[error("Invalid key settings: {0}")]
    InvalidKeySettings(String),
}

/// Domain store errors
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Corrupt domain data for {domain}: {message}")]
    Corrupt { domain: String, message: String },

    #[error("Domain not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

/// External command errors. Callers log these and carry on.
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    #[error("Failed to spawn `{command}`: {message}")]
    Spawn { command: String, message: String },

    #[error("`{command}` exited with {status}")]
    Failed { command: String, status: String },
}

/// Job envelope and queue errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Job {job} is missing field '{field}'")]
    MissingField { job: String, field: &'static str },

    #[error("Job {job} has invalid {field}: {value}")]
    InvalidField {
        job: String,
        field: &'static str,
        value: String,
    },

    #[error("Malformed job envelope: {0}")]
    Malformed(String),

    #[error("Job queue is closed")]
    QueueClosed,
}

/// DNSSEC key errors
#[derive(Error, Debug, Clone)]
pub enum KeyError {
    #[error("{tool} failed with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to run {tool}: {message}")]
    ToolSpawn { tool: String, message: String },

    #[error("Key generation produced no {0} file")]
    MissingOutput(&'static str),

    #[error("Invalid key data: {0}")]
    InvalidKeyData(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] JobError),
}

impl From<std::io::Error> for KeyError {
    fn from(err: std::io::Error) -> Self {
        KeyError::Io(err.to_string())
    }
}

/// Catalog zone errors
#[derive(Error, Debug, Clone)]
pub enum CatalogError {
    #[error("Catalog zone error: {0}")]
    Zone(#[from] ZoneError),

    #[error("IO error on catalog {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Failed to lock {path}: {message}")]
    Lock { path: PathBuf, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] JobError),
}

/// Zone deployment errors
#[derive(Error, Debug, Clone)]
pub enum DeployError {
    #[error("Zone error: {0}")]
    Zone(#[from] ZoneError),

    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Failed to lock {path}: {message}")]
    Lock { path: PathBuf, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Queue(#[from] JobError),
}

impl DeployError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Unified error for job handlers and the binary
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Zone(#[from] ZoneError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

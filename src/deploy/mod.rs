//! Per-domain zone deployment.

pub mod deployer;

pub use deployer::{DeployOptions, DeployOutcome, ZoneDeployer};

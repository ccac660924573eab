//! Error types for every fatal stage of an experiment batch.
//!
//! Per-run failures are not errors at this level: they are recorded inside a
//! [`SimulationResult`](crate::runner::SimulationResult) as a [`RunFailure`]
//! and the batch continues.

use std::path::PathBuf;
use thiserror::Error;

/// Raised while locating or loading scenario files, before any run is dispatched.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("scenario directory {} does not exist or is not a directory", path.display())]
    MissingDirectory { path: PathBuf },
    #[error("invalid scenario file pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("failed to read scenario directory {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load scenario {}: {reason}", path.display())]
    InvalidScenario { path: PathBuf, reason: String },
}

/// Raised when the registry or the runner options are unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no configurations registered")]
    Empty,
    #[error("configuration name must not be empty")]
    EmptyName,
    #[error("configuration {name:?} is registered more than once")]
    DuplicateName { name: String },
    #[error("configuration name {name:?} cannot be used as a report file name")]
    UnsafeName { name: String },
    #[error("unknown configuration {name:?}")]
    Unknown { name: String },
    #[error("repeat count must be at least 1")]
    ZeroRepeats,
    #[error("worker pool size must be at least 1")]
    ZeroThreads,
    #[error("failed to parse configuration file: {reason}")]
    Parse { reason: String },
}

/// Why a single simulation run produced no statistics.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunFailure {
    #[error("engine error: {0}")]
    Engine(String),
    #[error("simulation did not finish within {limit_minutes} simulated minutes")]
    Timeout { limit_minutes: f64 },
    #[error("run panicked: {0}")]
    Panicked(String),
}

/// Raised when a scenario's companion `.properties` file cannot be joined.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata file {} is missing", path.display())]
    MissingFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metadata key {key:?} missing from {source_name}")]
    MissingKey { key: &'static str, source_name: String },
    #[error("metadata key {key:?} has invalid value {value:?} in {source_name}")]
    InvalidValue {
        key: &'static str,
        value: String,
        source_name: String,
    },
    #[error("line {line} of {source_name} is not a `key = value` pair")]
    Malformed { line: usize, source_name: String },
    #[error("metadata key {key:?} appears more than once in {source_name}")]
    DuplicateKey { key: String, source_name: String },
}

/// Raised when a report file cannot be created or written.
#[derive(Debug, Error)]
#[error("failed to {action} {}", path.display())]
pub struct ReportError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Any error that aborts a batch.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),
    #[error("result refers to scenario {scenario_id} which was not loaded")]
    UnknownScenario { scenario_id: String },
}

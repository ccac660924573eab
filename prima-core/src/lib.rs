//! Prima Experiment Core
//!
//! Batch execution of dynamic pickup-and-delivery simulations: every
//! configuration is run on every discovered scenario, the results are grouped
//! per configuration in a fixed order, joined with each scenario's
//! classification metadata and written to one CSV report per configuration.
//! Reports are byte-for-byte reproducible for a fixed base seed.

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod fleet;
pub mod grouping;
pub mod metadata;
pub mod objective;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod seeds;
pub mod strategy;

// Re-export commonly used types
pub use config::{ConfigurationRegistry, ExperimentConfiguration, RegistryBuilder};
pub use discovery::ScenarioDiscovery;
pub use engine::{EngineOptions, ReferenceEngine, SimulationEngine};
pub use error::{
    ConfigurationError, DiscoveryError, ExperimentError, MetadataError, ReportError, RunFailure,
};
pub use experiment::{
    DEFAULT_DATASET, DEFAULT_PATTERN, DEFAULT_RESULTS, Experiment, ExperimentSummary,
};
pub use grouping::{ResultGroup, ResultGrouper};
pub use metadata::{MetadataJoiner, ScenarioMetadata};
pub use objective::{Gendreau06Objective, ObjectiveFunction, Statistics};
pub use report::{HEADER, ReportRow, ReportSummary, ReportWriter};
pub use runner::{
    ExperimentRunner, LogProgress, NoProgress, ProgressEvent, ProgressReporter, RunOutcome,
    RunnerOptions, SimulationResult, SimulationRun,
};
pub use scenario::{Scenario, ScenarioEntry, ScenarioEvent, ScenarioReference};
pub use seeds::{SeedSequence, parse_seed};
pub use strategy::{RoutePlannerKind, SolverKind, StrategyDescriptor};

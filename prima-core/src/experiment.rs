//! The end-to-end pipeline: discover, run, group, join and report.

use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ConfigurationRegistry;
use crate::discovery::ScenarioDiscovery;
use crate::engine::{EngineOptions, ReferenceEngine, SimulationEngine};
use crate::error::ExperimentError;
use crate::grouping::ResultGrouper;
use crate::metadata::MetadataJoiner;
use crate::objective::{Gendreau06Objective, ObjectiveFunction};
use crate::report::{ReportSummary, ReportWriter};
use crate::runner::{ExperimentRunner, ProgressReporter, RunnerOptions};

pub const DEFAULT_DATASET: &str = "files/dataset";
pub const DEFAULT_RESULTS: &str = "files/results";
pub const DEFAULT_PATTERN: &str = "**[0-9].scen";

/// Totals of one performed experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentSummary {
    pub simulations: usize,
    pub failed: usize,
    pub invalid: usize,
    pub reports: Vec<ReportSummary>,
    pub elapsed: Duration,
}

/// A fully described batch. Build with the chained setters, then [`perform`](Self::perform).
pub struct Experiment {
    dataset: PathBuf,
    results: PathBuf,
    pattern: String,
    registry: ConfigurationRegistry,
    options: RunnerOptions,
    objective: Arc<dyn ObjectiveFunction>,
    engine: Option<Arc<dyn SimulationEngine>>,
    engine_options: EngineOptions,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from(DEFAULT_DATASET),
            results: PathBuf::from(DEFAULT_RESULTS),
            pattern: DEFAULT_PATTERN.to_string(),
            registry: ConfigurationRegistry::defaults(),
            options: RunnerOptions::default(),
            objective: Arc::new(Gendreau06Objective::default()),
            engine: None,
            engine_options: EngineOptions::default(),
        }
    }
}

impl Experiment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dataset(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dataset = dir.into();
        self
    }

    #[must_use]
    pub fn results(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results = dir.into();
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: ConfigurationRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub const fn options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn objective(mut self, objective: Arc<dyn ObjectiveFunction>) -> Self {
        self.objective = objective;
        self
    }

    /// Replace the built-in [`ReferenceEngine`].
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn SimulationEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Limits for the built-in engine; ignored when a custom engine is set.
    #[must_use]
    pub const fn engine_options(mut self, options: EngineOptions) -> Self {
        self.engine_options = options;
        self
    }

    #[must_use]
    pub fn dataset_dir(&self) -> &Path {
        &self.dataset
    }

    #[must_use]
    pub fn results_dir(&self) -> &Path {
        &self.results
    }

    #[must_use]
    pub const fn configurations(&self) -> &ConfigurationRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn runner_options(&self) -> &RunnerOptions {
        &self.options
    }

    #[must_use]
    pub const fn engine_limits(&self) -> &EngineOptions {
        &self.engine_options
    }

    /// Run the whole batch and write one report per configuration.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: discovery, configuration, metadata or
    /// report I/O. Individual run failures are not errors.
    pub fn perform(
        &self,
        progress: &mut dyn ProgressReporter,
    ) -> Result<ExperimentSummary, ExperimentError> {
        let started = Instant::now();
        let scenarios = ScenarioDiscovery::new(&self.dataset, &self.pattern).discover_and_load()?;
        info!(
            "{} configuration(s), {} scenario(s), {} repeat(s)",
            self.registry.len(),
            scenarios.len(),
            self.options.repeats
        );

        let engine: Arc<dyn SimulationEngine> = match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => Arc::new(ReferenceEngine::new(
                Arc::clone(&self.objective),
                self.engine_options,
            )),
        };
        let results = ExperimentRunner::new(engine, self.options).run(
            &self.registry,
            &scenarios,
            progress,
        )?;
        let simulations = results.len();
        let groups = ResultGrouper::group(&self.registry, results)?;

        let writer = ReportWriter::new(&self.results, Arc::clone(&self.objective));
        let reports = writer.write_all(&groups, &scenarios, &mut MetadataJoiner::new())?;

        Ok(ExperimentSummary {
            simulations,
            failed: reports.iter().map(|r| r.failed).sum(),
            invalid: reports.iter().map(|r| r.invalid).sum(),
            reports,
            elapsed: started.elapsed(),
        })
    }
}

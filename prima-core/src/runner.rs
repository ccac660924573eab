//! Parallel execution of every `(configuration, scenario, repeat)` run.
//!
//! Runs are enumerated up front, dispatched to a bounded rayon pool, and
//! their results streamed back to the calling thread over a channel. The
//! calling thread is the only one that talks to the [`ProgressReporter`].

use log::{debug, info};
use rayon::prelude::*;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crate::config::{ConfigurationRegistry, ExperimentConfiguration};
use crate::engine::SimulationEngine;
use crate::error::{ConfigurationError, ExperimentError, RunFailure};
use crate::objective::Statistics;
use crate::scenario::{Scenario, ScenarioEntry, ScenarioReference};
use crate::seeds::SeedSequence;

/// Batch-wide knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub base_seed: u64,
    /// Runs per `(configuration, scenario)` pair.
    pub repeats: usize,
    /// Worker count; `None` uses the available parallelism.
    pub threads: Option<usize>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            base_seed: 123,
            repeats: 1,
            threads: None,
        }
    }
}

impl RunnerOptions {
    /// Resolved worker pool size.
    ///
    /// # Errors
    ///
    /// Rejects an explicit pool size of zero.
    pub fn worker_count(&self) -> Result<usize, ConfigurationError> {
        match self.threads {
            Some(0) => Err(ConfigurationError::ZeroThreads),
            Some(n) => Ok(n),
            None => Ok(std::thread::available_parallelism().map_or(1, NonZeroUsize::get)),
        }
    }
}

/// One planned execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRun {
    /// Position in the configuration-major enumeration; keys the seed.
    pub run_index: usize,
    pub configuration: String,
    pub scenario: ScenarioReference,
    pub seed: u64,
    pub repeat: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Statistics),
    Failed(RunFailure),
}

impl RunOutcome {
    #[must_use]
    pub const fn statistics(&self) -> Option<&Statistics> {
        match self {
            Self::Completed(stats) => Some(stats),
            Self::Failed(_) => None,
        }
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&RunFailure> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// The outcome of exactly one [`SimulationRun`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub run: SimulationRun,
    pub outcome: RunOutcome,
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    Started {
        total: usize,
        threads: usize,
    },
    RunFinished {
        completed: usize,
        total: usize,
        failed: usize,
        result: &'a SimulationResult,
    },
    Finished {
        total: usize,
        failed: usize,
        elapsed: Duration,
    },
}

/// Receives progress from the orchestrating thread, never from a worker.
pub trait ProgressReporter {
    fn report(&mut self, event: &ProgressEvent<'_>);
}

impl<F> ProgressReporter for F
where
    F: FnMut(&ProgressEvent<'_>),
{
    fn report(&mut self, event: &ProgressEvent<'_>) {
        self(event);
    }
}

/// Forwards progress to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&mut self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Started { total, threads } => {
                info!("starting {total} simulation(s) on {threads} worker(s)");
            }
            ProgressEvent::RunFinished {
                completed,
                total,
                result,
                ..
            } => match &result.outcome {
                RunOutcome::Completed(_) => debug!(
                    "[{completed}/{total}] {} on {} (seed {}) done",
                    result.run.configuration,
                    result.run.scenario.scenario_id(),
                    result.run.seed
                ),
                RunOutcome::Failed(failure) => debug!(
                    "[{completed}/{total}] {} on {} (seed {}) failed: {failure}",
                    result.run.configuration,
                    result.run.scenario.scenario_id(),
                    result.run.seed
                ),
            },
            ProgressEvent::Finished {
                total,
                failed,
                elapsed,
            } => info!("finished {total} simulation(s), {failed} failed, in {elapsed:?}"),
        }
    }
}

/// Discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _event: &ProgressEvent<'_>) {}
}

/// Executes the cross product of configurations, scenarios and repeats.
pub struct ExperimentRunner {
    engine: Arc<dyn SimulationEngine>,
    options: RunnerOptions,
}

struct Job<'a> {
    run: SimulationRun,
    configuration: &'a ExperimentConfiguration,
    scenario: &'a Scenario,
}

impl ExperimentRunner {
    #[must_use]
    pub fn new(engine: Arc<dyn SimulationEngine>, options: RunnerOptions) -> Self {
        Self { engine, options }
    }

    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Enumerate every run without executing anything.
    ///
    /// # Errors
    ///
    /// Rejects a zero repeat count.
    pub fn plan(
        &self,
        registry: &ConfigurationRegistry,
        scenarios: &[ScenarioEntry],
    ) -> Result<Vec<SimulationRun>, ConfigurationError> {
        Ok(self
            .jobs(registry, scenarios)?
            .into_iter()
            .map(|job| job.run)
            .collect())
    }

    fn jobs<'a>(
        &self,
        registry: &'a ConfigurationRegistry,
        scenarios: &'a [ScenarioEntry],
    ) -> Result<Vec<Job<'a>>, ConfigurationError> {
        let repeats = self.options.repeats;
        if repeats == 0 {
            return Err(ConfigurationError::ZeroRepeats);
        }
        let triples = registry.iter().flat_map(|configuration| {
            scenarios.iter().flat_map(move |entry| {
                (0..repeats).map(move |repeat| (configuration, entry, repeat))
            })
        });
        Ok(triples
            .zip(SeedSequence::new(self.options.base_seed))
            .enumerate()
            .map(|(run_index, ((configuration, entry, repeat), seed))| Job {
                run: SimulationRun {
                    run_index,
                    configuration: configuration.name.clone(),
                    scenario: entry.reference.clone(),
                    seed,
                    repeat,
                },
                configuration,
                scenario: entry.scenario.as_ref(),
            })
            .collect())
    }

    /// Execute every planned run and collect one result per run.
    ///
    /// Results come back in completion order. A run that errors or panics is
    /// recorded as [`RunOutcome::Failed`] and the batch carries on.
    ///
    /// # Errors
    ///
    /// Fails before dispatch on invalid options or if the pool cannot start.
    pub fn run(
        &self,
        registry: &ConfigurationRegistry,
        scenarios: &[ScenarioEntry],
        progress: &mut dyn ProgressReporter,
    ) -> Result<Vec<SimulationResult>, ExperimentError> {
        let threads = self.options.worker_count()?;
        let jobs = self.jobs(registry, scenarios)?;
        let total = jobs.len();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("prima-worker-{idx}"))
            .build()
            .map_err(|e| ExperimentError::WorkerPool(e.to_string()))?;

        let started = Instant::now();
        progress.report(&ProgressEvent::Started { total, threads });

        let engine = self.engine.as_ref();
        let (tx, rx) = mpsc::channel::<SimulationResult>();
        let mut results = Vec::with_capacity(total);
        let mut failed = 0;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                pool.install(|| {
                    jobs.into_par_iter().for_each_with(tx, |tx, job| {
                        let outcome = execute(engine, &job);
                        // The receiver outlives every worker.
                        let _ = tx.send(SimulationResult {
                            run: job.run,
                            outcome,
                        });
                    });
                });
            });

            for result in rx {
                if result.outcome.is_failed() {
                    failed += 1;
                }
                results.push(result);
                if let Some(last) = results.last() {
                    progress.report(&ProgressEvent::RunFinished {
                        completed: results.len(),
                        total,
                        failed,
                        result: last,
                    });
                }
            }
        });

        progress.report(&ProgressEvent::Finished {
            total,
            failed,
            elapsed: started.elapsed(),
        });
        Ok(results)
    }
}

fn execute(engine: &dyn SimulationEngine, job: &Job<'_>) -> RunOutcome {
    let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.run(job.configuration, job.scenario, job.run.seed)
    }));
    match attempt {
        Ok(Ok(stats)) => RunOutcome::Completed(stats),
        Ok(Err(failure)) => RunOutcome::Failed(failure),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            RunOutcome::Failed(RunFailure::Panicked(message))
        }
    }
}

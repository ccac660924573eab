//! Per-configuration CSV reports.

use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ExperimentError, ReportError};
use crate::grouping::ResultGroup;
use crate::metadata::{MetadataJoiner, ScenarioMetadata};
use crate::objective::ObjectiveFunction;
use crate::runner::{RunOutcome, SimulationResult};
use crate::scenario::{ScenarioEntry, ScenarioReference};

/// Column header written once at the top of every report.
pub const HEADER: &str = "dynamism,urgency,scale,cost,travel_time,tardiness,over_time,is_valid,scenario_id,random_seed,comp_time,num_vehicles,num_orders";

const REPORT_EXTENSION: &str = "csv";

/// Objective-derived columns; absent for a failed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scores {
    pub cost: f64,
    pub travel_time: f64,
    pub tardiness: f64,
    pub over_time: f64,
    pub comp_time: u64,
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub dynamism: f64,
    pub urgency: i64,
    pub scale: f64,
    pub scores: Option<Scores>,
    pub is_valid: bool,
    pub scenario_id: String,
    pub random_seed: u64,
    pub num_vehicles: usize,
    pub num_orders: i64,
}

impl ReportRow {
    #[must_use]
    pub fn new(
        result: &SimulationResult,
        metadata: &ScenarioMetadata,
        num_vehicles: usize,
        objective: &dyn ObjectiveFunction,
    ) -> Self {
        let (scores, is_valid) = match &result.outcome {
            RunOutcome::Completed(stats) => (
                Some(Scores {
                    cost: objective.cost(stats),
                    travel_time: objective.travel_time(stats),
                    tardiness: objective.tardiness(stats),
                    over_time: objective.over_time(stats),
                    comp_time: stats.computation_time,
                }),
                objective.is_valid(stats),
            ),
            RunOutcome::Failed(_) => (None, false),
        };
        Self {
            dynamism: metadata.dynamism,
            urgency: metadata.urgency,
            scale: metadata.scale,
            scores,
            is_valid,
            scenario_id: result.run.scenario.scenario_id(),
            random_seed: result.run.seed,
            num_vehicles,
            num_orders: metadata.num_orders,
        }
    }
}

/// Plain decimal text for a float: never an exponent, always a fractional part.
struct Decimal(f64);

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.0.to_string();
        if self.0.is_finite() && !text.contains('.') {
            write!(f, "{text}.0")
        } else {
            f.write_str(&text)
        }
    }
}

impl fmt::Display for ReportRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},",
            Decimal(self.dynamism),
            self.urgency,
            Decimal(self.scale)
        )?;
        match &self.scores {
            Some(s) => write!(
                f,
                "{},{},{},{},",
                Decimal(s.cost),
                Decimal(s.travel_time),
                Decimal(s.tardiness),
                Decimal(s.over_time)
            )?,
            None => f.write_str(",,,,")?,
        }
        write!(f, "{},{},{},", self.is_valid, self.scenario_id, self.random_seed)?;
        if let Some(s) = &self.scores {
            write!(f, "{}", s.comp_time)?;
        }
        write!(f, ",{},{}", self.num_vehicles, self.num_orders)
    }
}

/// What was written for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub configuration: String,
    pub path: PathBuf,
    pub rows: usize,
    pub invalid: usize,
    pub failed: usize,
}

/// Writes `<results_dir>/<configuration>.csv` for each result group.
pub struct ReportWriter {
    results_dir: PathBuf,
    objective: Arc<dyn ObjectiveFunction>,
}

impl ReportWriter {
    #[must_use]
    pub fn new(results_dir: impl Into<PathBuf>, objective: Arc<dyn ObjectiveFunction>) -> Self {
        Self {
            results_dir: results_dir.into(),
            objective,
        }
    }

    #[must_use]
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    #[must_use]
    pub fn report_path(&self, configuration: &str) -> PathBuf {
        self.results_dir
            .join(format!("{configuration}.{REPORT_EXTENSION}"))
    }

    /// Create parent directories, replace any existing file at `path` and
    /// write the header.
    ///
    /// # Errors
    ///
    /// Returns a [`ReportError`] naming the step and path that failed.
    pub fn truncate_create(path: &Path) -> Result<BufWriter<File>, ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ReportError {
                action: "create directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| ReportError {
            action: "create",
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{HEADER}").map_err(|source| ReportError {
            action: "write header to",
            path: path.to_path_buf(),
            source,
        })?;
        Ok(writer)
    }

    /// Write one configuration's report.
    ///
    /// Invalid and failed runs are written like any other row and logged as
    /// warnings.
    ///
    /// # Errors
    ///
    /// Aborts on the first metadata or I/O error. Rows already written stay
    /// in the file.
    pub fn write_group(
        &self,
        group: &ResultGroup,
        scenarios: &[ScenarioEntry],
        joiner: &mut MetadataJoiner,
    ) -> Result<ReportSummary, ExperimentError> {
        let vehicles: HashMap<&ScenarioReference, usize> = scenarios
            .iter()
            .map(|entry| (&entry.reference, entry.scenario.vehicle_count()))
            .collect();
        let path = self.report_path(&group.configuration);
        let mut writer = Self::truncate_create(&path)?;
        let write_err = |source| ReportError {
            action: "write",
            path: path.clone(),
            source,
        };

        let mut summary = ReportSummary {
            configuration: group.configuration.clone(),
            path: path.clone(),
            rows: 0,
            invalid: 0,
            failed: 0,
        };
        for result in &group.results {
            let reference = &result.run.scenario;
            let num_vehicles = *vehicles.get(reference).ok_or_else(|| {
                ExperimentError::UnknownScenario {
                    scenario_id: reference.scenario_id(),
                }
            })?;
            let metadata = joiner.metadata_for(reference)?;
            let row = ReportRow::new(result, metadata, num_vehicles, self.objective.as_ref());
            writeln!(writer, "{row}").map_err(write_err)?;
            summary.rows += 1;

            if let RunOutcome::Failed(failure) = &result.outcome {
                summary.failed += 1;
                warn!(
                    "{}: run with seed {} failed ({failure}): {row}",
                    group.configuration, result.run.seed
                );
            } else if !row.is_valid {
                summary.invalid += 1;
                warn!("{}: found an invalid result: {row}", group.configuration);
            }
        }
        writer.flush().map_err(write_err)?;
        info!("wrote {} row(s) to {}", summary.rows, path.display());
        Ok(summary)
    }

    /// Write every group, sequentially and in the given order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing group.
    pub fn write_all(
        &self,
        groups: &[ResultGroup],
        scenarios: &[ScenarioEntry],
        joiner: &mut MetadataJoiner,
    ) -> Result<Vec<ReportSummary>, ExperimentError> {
        groups
            .iter()
            .map(|group| self.write_group(group, scenarios, joiner))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MetadataError, RunFailure};
    use crate::objective::{Gendreau06Objective, Statistics};
    use crate::runner::SimulationRun;
    use crate::scenario::{Scenario, ScenarioEvent};

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "prima-report-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn entry(dir: &Path, id: &str, vehicles: usize) -> ScenarioEntry {
        fs::write(
            dir.join(format!("{id}.properties")),
            "dynamism_bin = 0.42\nurgency = 30\nscale = 1.5\nAddParcelEvent = 50\n",
        )
        .unwrap();
        ScenarioEntry::new(
            ScenarioReference::from_path(dir.join(format!("{id}.scen"))),
            Scenario {
                events: vec![
                    ScenarioEvent::AddVehicle {
                        time: 0.0,
                        speed: 30.0
                    };
                    vehicles
                ],
            },
        )
    }

    fn stats() -> Statistics {
        Statistics {
            total_travel_time: 50.0,
            pickup_tardiness: 2.5,
            delivery_tardiness: 1.5,
            over_time: 6.0,
            total_parcels: 3,
            total_pickups: 3,
            total_deliveries: 3,
            total_vehicles: 2,
            vehicles_at_depot: 2,
            simulation_finished: true,
            computation_time: 12,
            ..Statistics::default()
        }
    }

    fn result(entry: &ScenarioEntry, seed: u64, outcome: RunOutcome) -> SimulationResult {
        SimulationResult {
            run: SimulationRun {
                run_index: 0,
                configuration: "Random".to_string(),
                scenario: entry.reference.clone(),
                seed,
                repeat: 0,
            },
            outcome,
        }
    }

    fn writer(dir: &Path) -> ReportWriter {
        ReportWriter::new(dir.join("results"), Arc::new(Gendreau06Objective::default()))
    }

    #[test]
    fn rows_use_fixed_column_layout() {
        let dir = temp_dir("row");
        let entry = entry(&dir, "a-1", 2);
        let metadata = MetadataJoiner::new()
            .metadata_for(&entry.reference)
            .unwrap()
            .clone();
        let row = ReportRow::new(
            &result(&entry, 17, RunOutcome::Completed(stats())),
            &metadata,
            2,
            &Gendreau06Objective::default(),
        );
        assert_eq!(row.to_string(), "0.42,30,1.5,60.0,50.0,4.0,6.0,true,a-1,17,12,2,50");
        assert_eq!(HEADER.split(',').count(), 13);
    }

    #[test]
    fn extreme_floats_are_written_without_exponent() {
        let row = ReportRow {
            dynamism: 1e-7,
            urgency: 1,
            scale: 1e16,
            scores: Some(Scores {
                cost: 2.5e20,
                travel_time: 0.0,
                tardiness: 3.0,
                over_time: 1e-9,
                comp_time: 4,
            }),
            is_valid: true,
            scenario_id: "a-1".to_string(),
            random_seed: 9,
            num_vehicles: 1,
            num_orders: 2,
        };
        let text = row.to_string();
        assert!(!text.contains('e'), "{text}");
        assert!(text.starts_with("0.0000001,1,10000000000000000.0,250000000000000000000.0,0.0,3.0,0.000000001,"));
    }

    #[test]
    fn two_results_give_three_lines_and_overwrite_old_reports() {
        let dir = temp_dir("overwrite");
        let entry = entry(&dir, "a-1", 2);
        let writer = writer(&dir);
        let path = writer.report_path("Random");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "stale\nstale\nstale\nstale\nstale\n").unwrap();

        let group = ResultGroup {
            configuration: "Random".to_string(),
            results: vec![
                result(&entry, 1, RunOutcome::Completed(stats())),
                result(&entry, 2, RunOutcome::Completed(stats())),
            ],
        };
        let summary = writer
            .write_group(&group, std::slice::from_ref(&entry), &mut MetadataJoiner::new())
            .unwrap();
        assert_eq!(summary.rows, 2);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER);
        assert!(text.ends_with('\n'));
        assert!(!text.contains("stale"));
    }

    #[test]
    fn failed_and_invalid_runs_are_still_written() {
        let dir = temp_dir("failed");
        let entry = entry(&dir, "a-1", 1);
        let invalid = Statistics {
            total_deliveries: 1,
            ..stats()
        };
        let group = ResultGroup {
            configuration: "Random".to_string(),
            results: vec![
                result(
                    &entry,
                    1,
                    RunOutcome::Failed(RunFailure::Engine("boom".to_string())),
                ),
                result(&entry, 2, RunOutcome::Completed(invalid)),
            ],
        };
        let writer = writer(&dir);
        let summary = writer
            .write_group(&group, std::slice::from_ref(&entry), &mut MetadataJoiner::new())
            .unwrap();
        assert_eq!((summary.rows, summary.failed, summary.invalid), (2, 1, 1));

        let text = fs::read_to_string(writer.report_path("Random")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "0.42,30,1.5,,,,,false,a-1,1,,1,50");
        assert!(lines[2].contains(",false,a-1,2,12,1,50"));
    }

    #[test]
    fn empty_group_writes_header_only() {
        let dir = temp_dir("empty");
        let writer = writer(&dir);
        let group = ResultGroup {
            configuration: "CheapInsert".to_string(),
            results: Vec::new(),
        };
        writer
            .write_all(&[group], &[], &mut MetadataJoiner::new())
            .unwrap();
        let text = fs::read_to_string(writer.report_path("CheapInsert")).unwrap();
        assert_eq!(text, format!("{HEADER}\n"));
    }

    #[test]
    fn missing_metadata_aborts_the_report() {
        let dir = temp_dir("nometa");
        let entry = entry(&dir, "a-1", 1);
        fs::remove_file(entry.reference.metadata_path()).unwrap();
        let group = ResultGroup {
            configuration: "Random".to_string(),
            results: vec![result(&entry, 1, RunOutcome::Completed(stats()))],
        };
        let err = writer(&dir)
            .write_group(&group, std::slice::from_ref(&entry), &mut MetadataJoiner::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ExperimentError::Metadata(MetadataError::MissingFile { .. })
        ));
    }
}

//! Scenario references and the scenario definition format.
//!
//! A scenario file (`<problemClass>-<instanceId>.scen`) is a JSON document
//! holding a list of timed events. Its classification metadata lives next to
//! it in `<problemClass>-<instanceId>.properties`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DiscoveryError;

/// File extension of the companion metadata file.
pub const METADATA_EXTENSION: &str = "properties";

/// Identity and location of one scenario and its metadata file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenarioReference {
    problem_class: String,
    instance_id: String,
    scenario_path: PathBuf,
    metadata_path: PathBuf,
}

impl ScenarioReference {
    /// Derive a reference from a scenario file path.
    ///
    /// The file stem is split at its last `-` into problem class and instance
    /// id. A stem without `-` is used whole as the problem class.
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let scenario_path = path.into();
        let stem = scenario_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (problem_class, instance_id) = match stem.rsplit_once('-') {
            Some((pc, id)) => (pc.to_string(), id.to_string()),
            None => (stem, String::new()),
        };
        let mut reference = Self {
            problem_class,
            instance_id,
            metadata_path: PathBuf::new(),
            scenario_path,
        };
        let dir = reference
            .scenario_path
            .parent()
            .map_or_else(PathBuf::new, Path::to_path_buf);
        reference.metadata_path =
            dir.join(format!("{}.{METADATA_EXTENSION}", reference.scenario_id()));
        reference
    }

    #[must_use]
    pub fn problem_class(&self) -> &str {
        &self.problem_class
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    #[must_use]
    pub fn scenario_path(&self) -> &Path {
        &self.scenario_path
    }

    #[must_use]
    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    /// `"<problemClass>-<instanceId>"`, the key shared by the scenario and its metadata.
    #[must_use]
    pub fn scenario_id(&self) -> String {
        if self.instance_id.is_empty() {
            self.problem_class.clone()
        } else {
            format!("{}-{}", self.problem_class, self.instance_id)
        }
    }

    /// Canonical ordering: problem class, then instance id, lexicographically.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.problem_class
            .cmp(&other.problem_class)
            .then_with(|| self.instance_id.cmp(&other.instance_id))
    }
}

/// Planar position in kilometres.
pub type Point = [f64; 2];

/// Closed time interval in minutes.
pub type TimeWindow = [f64; 2];

/// One timed event of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioEvent {
    AddDepot {
        time: f64,
        position: Point,
    },
    AddVehicle {
        time: f64,
        #[serde(default = "default_vehicle_speed")]
        speed: f64,
    },
    AddParcel {
        time: f64,
        pickup: Point,
        delivery: Point,
        pickup_window: TimeWindow,
        delivery_window: TimeWindow,
        #[serde(default)]
        pickup_duration: f64,
        #[serde(default)]
        delivery_duration: f64,
    },
    TimeOut {
        time: f64,
    },
}

const fn default_vehicle_speed() -> f64 {
    30.0
}

impl ScenarioEvent {
    #[must_use]
    pub const fn time(&self) -> f64 {
        match self {
            Self::AddDepot { time, .. }
            | Self::AddVehicle { time, .. }
            | Self::AddParcel { time, .. }
            | Self::TimeOut { time } => *time,
        }
    }
}

/// A loaded scenario definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub events: Vec<ScenarioEvent>,
}

impl Scenario {
    /// Parse a scenario from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the document does not match the format.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Number of vehicle-introduction events.
    #[must_use]
    pub fn vehicle_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScenarioEvent::AddVehicle { .. }))
            .count()
    }

    #[must_use]
    pub fn parcel_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScenarioEvent::AddParcel { .. }))
            .count()
    }

    /// Events in time order; ties keep their file order.
    #[must_use]
    pub fn events_in_time_order(&self) -> Vec<&ScenarioEvent> {
        let mut events: Vec<&ScenarioEvent> = self.events.iter().collect();
        events.sort_by(|a, b| a.time().total_cmp(&b.time()));
        events
    }
}

/// A discovered scenario together with its loaded definition.
#[derive(Debug, Clone)]
pub struct ScenarioEntry {
    pub reference: ScenarioReference,
    pub scenario: Arc<Scenario>,
}

impl ScenarioEntry {
    #[must_use]
    pub fn new(reference: ScenarioReference, scenario: Scenario) -> Self {
        Self {
            reference,
            scenario: Arc::new(scenario),
        }
    }

    /// Read and parse the scenario file behind `reference`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidScenario`] if the file is unreadable or malformed.
    pub fn load(reference: ScenarioReference) -> Result<Self, DiscoveryError> {
        let path = reference.scenario_path().to_path_buf();
        let text = fs::read_to_string(&path).map_err(|e| DiscoveryError::InvalidScenario {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let scenario = Scenario::from_json(&text).map_err(|e| DiscoveryError::InvalidScenario {
            path,
            reason: e.to_string(),
        })?;
        Ok(Self::new(reference, scenario))
    }
}

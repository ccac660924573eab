//! The simulation engine seam and the built-in reference engine.

use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ExperimentConfiguration;
use crate::error::RunFailure;
use crate::fleet::{Fleet, Parcel, Vehicle};
use crate::objective::{ObjectiveFunction, Statistics};
use crate::scenario::{Scenario, ScenarioEvent};

/// Executes one run of a configuration on a scenario.
///
/// Implementations must be deterministic in `(configuration, scenario, seed)`
/// and must not share mutable state between calls.
pub trait SimulationEngine: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`RunFailure`] when the run cannot produce statistics.
    fn run(
        &self,
        configuration: &ExperimentConfiguration,
        scenario: &Scenario,
        seed: u64,
    ) -> Result<Statistics, RunFailure>;
}

/// Limits applied by the [`ReferenceEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// A run whose last vehicle returns later than this is a timeout.
    #[serde(default = "EngineOptions::default_max_sim_minutes")]
    pub max_sim_minutes: f64,
}

impl EngineOptions {
    const fn default_max_sim_minutes() -> f64 {
        7.0 * 24.0 * 60.0
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_sim_minutes: Self::default_max_sim_minutes(),
        }
    }
}

/// Semi-dynamic pickup-and-delivery simulator.
///
/// Parcels are revealed at their announcement time and handed to the
/// configuration's coordinator; stops a vehicle has already set off for are
/// never reordered. Parcels announced at or after the time-out are refused.
pub struct ReferenceEngine {
    objective: Arc<dyn ObjectiveFunction>,
    options: EngineOptions,
}

impl ReferenceEngine {
    #[must_use]
    pub fn new(objective: Arc<dyn ObjectiveFunction>, options: EngineOptions) -> Self {
        Self { objective, options }
    }
}

impl SimulationEngine for ReferenceEngine {
    fn run(
        &self,
        configuration: &ExperimentConfiguration,
        scenario: &Scenario,
        seed: u64,
    ) -> Result<Statistics, RunFailure> {
        let depot = scenario
            .events
            .iter()
            .find_map(|e| match e {
                ScenarioEvent::AddDepot { position, .. } => Some(*position),
                _ => None,
            })
            .unwrap_or([0.0, 0.0]);
        let end_time = scenario
            .events
            .iter()
            .find_map(|e| match e {
                ScenarioEvent::TimeOut { time } => Some(*time),
                _ => None,
            })
            .unwrap_or(f64::INFINITY);

        let mut fleet = Fleet::new(depot, end_time, self.objective.as_ref());
        let mut coordinator = configuration.strategy.coordinator(seed);
        let mut total_parcels = 0;
        let mut last_event = 0.0_f64;

        for event in scenario.events_in_time_order() {
            last_event = last_event.max(event.time());
            match *event {
                ScenarioEvent::AddDepot { .. } | ScenarioEvent::TimeOut { .. } => {}
                ScenarioEvent::AddVehicle { time, speed } => {
                    if !(speed > 0.0 && speed.is_finite()) {
                        return Err(RunFailure::Engine(format!(
                            "vehicle added at {time} has non-positive speed {speed}"
                        )));
                    }
                    fleet.vehicles.push(Vehicle {
                        available_at: time,
                        speed,
                        route: Vec::new(),
                    });
                }
                ScenarioEvent::AddParcel {
                    time,
                    pickup,
                    delivery,
                    pickup_window,
                    delivery_window,
                    pickup_duration,
                    delivery_duration,
                } => {
                    total_parcels += 1;
                    if time >= end_time {
                        trace!("refusing parcel announced at {time} after time-out {end_time}");
                        continue;
                    }
                    fleet.now = time;
                    let parcel = fleet.parcels.len();
                    fleet.parcels.push(Parcel {
                        announced: time,
                        pickup,
                        delivery,
                        pickup_window,
                        delivery_window,
                        pickup_duration,
                        delivery_duration,
                    });
                    let insertion = coordinator.award(&fleet, parcel).ok_or_else(|| {
                        RunFailure::Engine(format!("no vehicle available for parcel announced at {time}"))
                    })?;
                    let route = fleet.with_insertion(parcel, &insertion);
                    fleet.vehicles[insertion.vehicle].route = route;
                    if let Some(planned) = coordinator.plan(&fleet, insertion.vehicle) {
                        fleet.vehicles[insertion.vehicle].route = planned;
                    }
                }
            }
        }

        let mut stats = Statistics {
            total_parcels,
            total_pickups: fleet.parcels.len(),
            total_deliveries: fleet.parcels.len(),
            total_vehicles: fleet.vehicles.len(),
            vehicles_at_depot: fleet.vehicles.len(),
            simulation_finished: true,
            simulation_time: last_event,
            ..Statistics::default()
        };
        for vehicle in &fleet.vehicles {
            let schedule = fleet.schedule(vehicle, &vehicle.route);
            stats.total_distance += schedule.distance;
            stats.total_travel_time += schedule.travel_time;
            stats.pickup_tardiness += schedule.pickup_tardiness;
            stats.delivery_tardiness += schedule.delivery_tardiness;
            stats.over_time += schedule.over_time;
            stats.simulation_time = stats.simulation_time.max(schedule.return_time);
        }
        if stats.simulation_time > self.options.max_sim_minutes {
            return Err(RunFailure::Timeout {
                limit_minutes: self.options.max_sim_minutes,
            });
        }
        stats.computation_time = fleet.evaluations();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Gendreau06Objective;

    fn scenario(json: &str) -> Scenario {
        Scenario::from_json(json).unwrap()
    }

    fn engine() -> ReferenceEngine {
        ReferenceEngine::new(Arc::new(Gendreau06Objective::default()), EngineOptions::default())
    }

    const TWO_PARCELS: &str = r#"{"events": [
        {"type": "add_depot", "time": 0.0, "position": [0.0, 0.0]},
        {"type": "add_vehicle", "time": 0.0, "speed": 60.0},
        {"type": "add_vehicle", "time": 0.0, "speed": 60.0},
        {"type": "add_parcel", "time": 0.0, "pickup": [1.0, 0.0], "delivery": [2.0, 0.0],
         "pickup_window": [0.0, 100.0], "delivery_window": [0.0, 200.0]},
        {"type": "add_parcel", "time": 10.0, "pickup": [0.0, 3.0], "delivery": [0.0, 4.0],
         "pickup_window": [0.0, 100.0], "delivery_window": [0.0, 200.0]},
        {"type": "time_out", "time": 480.0}
    ]}"#;

    #[test]
    fn every_configuration_serves_every_parcel() {
        let objective = Gendreau06Objective::default();
        let s = scenario(TWO_PARCELS);
        for cfg in crate::config::ConfigurationRegistry::defaults().iter() {
            let stats = engine().run(cfg, &s, 42).unwrap();
            assert_eq!(stats.total_parcels, 2, "{}", cfg.name);
            assert_eq!(stats.total_deliveries, 2, "{}", cfg.name);
            assert!(objective.is_valid(&stats), "{}", cfg.name);
            assert!(stats.total_distance > 0.0);
            assert!(stats.computation_time > 0);
        }
    }

    #[test]
    fn runs_are_reproducible_for_a_seed() {
        let s = scenario(TWO_PARCELS);
        let cfg = crate::config::ExperimentConfiguration::random();
        assert_eq!(engine().run(&cfg, &s, 7), engine().run(&cfg, &s, 7));
    }

    #[test]
    fn parcels_without_vehicles_fail_the_run() {
        let s = scenario(
            r#"{"events": [
                {"type": "add_parcel", "time": 0.0, "pickup": [1.0, 0.0], "delivery": [2.0, 0.0],
                 "pickup_window": [0.0, 100.0], "delivery_window": [0.0, 200.0]}
            ]}"#,
        );
        let cfg = crate::config::ExperimentConfiguration::cheapest_insertion();
        assert!(matches!(
            engine().run(&cfg, &s, 1),
            Err(RunFailure::Engine(_))
        ));
    }

    #[test]
    fn late_parcels_are_refused_and_invalidate_the_result() {
        let s = scenario(
            r#"{"events": [
                {"type": "add_vehicle", "time": 0.0},
                {"type": "time_out", "time": 60.0},
                {"type": "add_parcel", "time": 90.0, "pickup": [1.0, 0.0], "delivery": [2.0, 0.0],
                 "pickup_window": [0.0, 100.0], "delivery_window": [0.0, 200.0]}
            ]}"#,
        );
        let cfg = crate::config::ExperimentConfiguration::cheapest_insertion();
        let stats = engine().run(&cfg, &s, 1).unwrap();
        assert_eq!(stats.total_parcels, 1);
        assert_eq!(stats.total_deliveries, 0);
        assert!(!Gendreau06Objective::default().is_valid(&stats));
    }

    #[test]
    fn exceeding_the_horizon_is_a_timeout() {
        let engine = ReferenceEngine::new(
            Arc::new(Gendreau06Objective::default()),
            EngineOptions {
                max_sim_minutes: 1.0,
            },
        );
        let cfg = crate::config::ExperimentConfiguration::cheapest_insertion();
        assert!(matches!(
            engine.run(&cfg, &scenario(TWO_PARCELS), 1),
            Err(RunFailure::Timeout { .. })
        ));
    }
}

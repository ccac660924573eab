//! Run statistics and the objective function that scores them.

use serde::{Deserialize, Serialize};

/// Raw statistics produced by one simulation run. Times are in minutes,
/// distances in kilometres.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub total_distance: f64,
    pub total_travel_time: f64,
    pub pickup_tardiness: f64,
    pub delivery_tardiness: f64,
    pub over_time: f64,
    pub total_parcels: usize,
    pub total_pickups: usize,
    pub total_deliveries: usize,
    pub total_vehicles: usize,
    pub vehicles_at_depot: usize,
    pub simulation_finished: bool,
    pub simulation_time: f64,
    /// Solver effort spent on the run, in schedule evaluations.
    pub computation_time: u64,
}

/// Maps raw statistics to cost components and a validity verdict.
///
/// Implementations are pure and shared read-only between workers and the
/// report writer.
pub trait ObjectiveFunction: Send + Sync {
    fn cost(&self, stats: &Statistics) -> f64;
    fn travel_time(&self, stats: &Statistics) -> f64;
    fn tardiness(&self, stats: &Statistics) -> f64;
    fn over_time(&self, stats: &Statistics) -> f64;
    fn is_valid(&self, stats: &Statistics) -> bool;
}

/// Sum of travel time, tardiness and overtime, with equal weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gendreau06Objective {
    pub travel_weight: f64,
    pub tardiness_weight: f64,
    pub over_time_weight: f64,
}

impl Default for Gendreau06Objective {
    fn default() -> Self {
        Self {
            travel_weight: 1.0,
            tardiness_weight: 1.0,
            over_time_weight: 1.0,
        }
    }
}

impl ObjectiveFunction for Gendreau06Objective {
    fn cost(&self, stats: &Statistics) -> f64 {
        self.travel_weight * self.travel_time(stats)
            + self.tardiness_weight * self.tardiness(stats)
            + self.over_time_weight * self.over_time(stats)
    }

    fn travel_time(&self, stats: &Statistics) -> f64 {
        stats.total_travel_time
    }

    fn tardiness(&self, stats: &Statistics) -> f64 {
        stats.pickup_tardiness + stats.delivery_tardiness
    }

    fn over_time(&self, stats: &Statistics) -> f64 {
        stats.over_time
    }

    fn is_valid(&self, stats: &Statistics) -> bool {
        stats.total_vehicles > 0
            && stats.simulation_finished
            && stats.total_pickups == stats.total_parcels
            && stats.total_deliveries == stats.total_parcels
            && stats.vehicles_at_depot == stats.total_vehicles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_stats() -> Statistics {
        Statistics {
            total_distance: 25.0,
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
            simulation_time: 480.0,
            computation_time: 12,
        }
    }

    #[test]
    fn cost_is_sum_of_components() {
        let objective = Gendreau06Objective::default();
        let stats = complete_stats();
        assert!((objective.tardiness(&stats) - 4.0).abs() < 1e-9);
        assert!((objective.cost(&stats) - 60.0).abs() < 1e-9);
        assert!(objective.is_valid(&stats));
    }

    #[test]
    fn undelivered_parcels_invalidate_the_result() {
        let objective = Gendreau06Objective::default();
        let stats = Statistics {
            total_deliveries: 2,
            ..complete_stats()
        };
        assert!(!objective.is_valid(&stats));
    }

    #[test]
    fn vehicle_away_from_depot_invalidates_the_result() {
        let objective = Gendreau06Objective::default();
        let stats = Statistics {
            vehicles_at_depot: 1,
            ..complete_stats()
        };
        assert!(!objective.is_valid(&stats));
    }

    #[test]
    fn weights_scale_components() {
        let objective = Gendreau06Objective {
            travel_weight: 2.0,
            ..Gendreau06Objective::default()
        };
        assert!((objective.cost(&complete_stats()) - 110.0).abs() < 1e-9);
    }
}

//! Coordination strategies: named descriptors and the capability they build.
//!
//! A [`StrategyDescriptor`] is plain data, stored in the registry and
//! serialisable to the configuration file. At run time it builds a
//! [`Coordinator`] seeded for that run.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fleet::{Fleet, Insertion, Stop, StopKind, insert_parcel, respects_precedence};

/// Single-parcel insertion heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    CheapestInsertion,
    Random,
}

impl SolverKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CheapestInsertion => "cih",
            Self::Random => "rnd",
        }
    }
}

/// How a vehicle re-plans its own route after winning a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutePlannerKind {
    /// Rebuild the uncommitted part of the route with the solver.
    Solver { solver: SolverKind },
    /// Rebuild with the solver, then improve with breadth-first 2-opt.
    Opt2 { solver: SolverKind },
}

impl RoutePlannerKind {
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::Solver { solver } => solver.label().to_string(),
            Self::Opt2 { solver } => format!("opt2{}", solver.label()),
        }
    }
}

/// Closed set of coordination strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyDescriptor {
    /// A central solver sees every vehicle and assigns each new parcel.
    Central { solver: SolverKind },
    /// Vehicles bid on each parcel; the lowest bid wins and re-plans.
    Auction {
        route_planner: RoutePlannerKind,
        bidder: SolverKind,
    },
}

impl StrategyDescriptor {
    /// Build the coordinator for one run.
    #[must_use]
    pub fn coordinator(self, seed: u64) -> Box<dyn Coordinator> {
        let rng = ChaCha20Rng::seed_from_u64(seed);
        match self {
            Self::Central { solver } => Box::new(CentralCoordinator { solver, rng }),
            Self::Auction {
                route_planner,
                bidder,
            } => Box::new(AuctionCoordinator {
                route_planner,
                bidder,
                rng,
            }),
        }
    }
}

impl fmt::Display for StrategyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Central { solver } => write!(f, "central-{}", solver.label()),
            Self::Auction {
                route_planner,
                bidder,
            } => write!(f, "auction-R-{}-B-{}", route_planner.label(), bidder.label()),
        }
    }
}

/// Capability shared by every strategy.
pub trait Coordinator {
    /// Offer from `vehicle` to serve `parcel`, or `None` if it cannot.
    fn bid(&mut self, fleet: &Fleet<'_>, vehicle: usize, parcel: usize) -> Option<Insertion>;

    /// Improved route for `vehicle`, or `None` to keep the current one.
    fn plan(&mut self, fleet: &Fleet<'_>, vehicle: usize) -> Option<Vec<Stop>>;

    /// Choose who serves `parcel`. Defaults to the lowest bid; ties go to
    /// the lowest vehicle index.
    fn award(&mut self, fleet: &Fleet<'_>, parcel: usize) -> Option<Insertion> {
        let mut best: Option<Insertion> = None;
        for vehicle in 0..fleet.vehicles.len() {
            if let Some(bid) = self.bid(fleet, vehicle, parcel)
                && best.is_none_or(|b| bid.cost_delta < b.cost_delta)
            {
                best = Some(bid);
            }
        }
        best
    }
}

fn solve(
    solver: SolverKind,
    rng: &mut ChaCha20Rng,
    fleet: &Fleet<'_>,
    vehicle: usize,
    parcel: usize,
) -> Option<Insertion> {
    let candidates = fleet.candidate_insertions(vehicle, parcel);
    match solver {
        SolverKind::CheapestInsertion => cheapest(candidates),
        SolverKind::Random => {
            if candidates.is_empty() {
                None
            } else {
                let pick = rng.gen_range(0..candidates.len());
                Some(candidates[pick])
            }
        }
    }
}

fn cheapest(candidates: Vec<Insertion>) -> Option<Insertion> {
    candidates
        .into_iter()
        .reduce(|best, c| if c.cost_delta < best.cost_delta { c } else { best })
}

struct CentralCoordinator {
    solver: SolverKind,
    rng: ChaCha20Rng,
}

impl Coordinator for CentralCoordinator {
    fn bid(&mut self, fleet: &Fleet<'_>, vehicle: usize, parcel: usize) -> Option<Insertion> {
        solve(self.solver, &mut self.rng, fleet, vehicle, parcel)
    }

    fn plan(&mut self, _fleet: &Fleet<'_>, _vehicle: usize) -> Option<Vec<Stop>> {
        None
    }

    fn award(&mut self, fleet: &Fleet<'_>, parcel: usize) -> Option<Insertion> {
        match self.solver {
            SolverKind::CheapestInsertion => {
                let all = (0..fleet.vehicles.len())
                    .flat_map(|v| fleet.candidate_insertions(v, parcel))
                    .collect();
                cheapest(all)
            }
            SolverKind::Random => {
                if fleet.vehicles.is_empty() {
                    return None;
                }
                let vehicle = self.rng.gen_range(0..fleet.vehicles.len());
                self.bid(fleet, vehicle, parcel)
            }
        }
    }
}

struct AuctionCoordinator {
    route_planner: RoutePlannerKind,
    bidder: SolverKind,
    rng: ChaCha20Rng,
}

impl Coordinator for AuctionCoordinator {
    fn bid(&mut self, fleet: &Fleet<'_>, vehicle: usize, parcel: usize) -> Option<Insertion> {
        solve(self.bidder, &mut self.rng, fleet, vehicle, parcel)
    }

    fn plan(&mut self, fleet: &Fleet<'_>, vehicle: usize) -> Option<Vec<Stop>> {
        let (solver, improve) = match self.route_planner {
            RoutePlannerKind::Solver { solver } => (solver, false),
            RoutePlannerKind::Opt2 { solver } => (solver, true),
        };
        let start = fleet.committed(vehicle);
        let rebuilt = rebuild(fleet, vehicle, start, solver, &mut self.rng);
        if improve {
            Some(two_opt(fleet, vehicle, start, rebuilt))
        } else {
            Some(rebuilt)
        }
    }
}

/// Re-insert, one at a time and in route order, every parcel whose pickup
/// is still ahead of the vehicle. Deliveries of parcels already on board
/// keep their relative order.
fn rebuild(
    fleet: &Fleet<'_>,
    vehicle: usize,
    start: usize,
    solver: SolverKind,
    rng: &mut ChaCha20Rng,
) -> Vec<Stop> {
    let route = &fleet.vehicles[vehicle].route;
    let suffix = &route[start..];
    let mut planned: Vec<Stop> = route[..start].to_vec();
    let mut pending = Vec::new();
    for stop in suffix {
        let pickup_ahead = suffix
            .iter()
            .any(|s| s.parcel == stop.parcel && s.kind == StopKind::Pickup);
        if !pickup_ahead {
            planned.push(*stop);
        } else if stop.kind == StopKind::Pickup {
            pending.push(*stop);
        }
    }

    for pickup in pending {
        let candidates =
            fleet.candidates_for_route(vehicle, &planned, start, pickup.parcel, pickup.release);
        let choice = match solver {
            SolverKind::CheapestInsertion => cheapest(candidates),
            SolverKind::Random if candidates.is_empty() => None,
            SolverKind::Random => Some(candidates[rng.gen_range(0..candidates.len())]),
        };
        if let Some(insertion) = choice {
            planned = insert_parcel(&planned, pickup.parcel, &insertion, pickup.release);
        }
    }
    planned
}

const MAX_OPT2_ROUNDS: usize = 100;

/// Breadth-first 2-opt: evaluate every swap of two stops at or after
/// `start`, apply the best improving one, repeat until no swap improves.
fn two_opt(fleet: &Fleet<'_>, vehicle: usize, start: usize, mut route: Vec<Stop>) -> Vec<Stop> {
    let mut cost = fleet.route_cost(vehicle, &route);

    for _ in 0..MAX_OPT2_ROUNDS {
        let mut best: Option<(f64, Vec<Stop>)> = None;
        for i in start..route.len() {
            for j in i + 1..route.len() {
                let mut candidate = route.clone();
                candidate.swap(i, j);
                if !respects_precedence(&candidate) {
                    continue;
                }
                let candidate_cost = fleet.route_cost(vehicle, &candidate);
                let threshold = best.as_ref().map_or(cost - 1e-9, |(c, _)| *c);
                if candidate_cost < threshold {
                    best = Some((candidate_cost, candidate));
                }
            }
        }
        let Some((c, r)) = best else {
            break;
        };
        cost = c;
        route = r;
    }

    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::{Parcel, Vehicle};
    use crate::objective::Gendreau06Objective;

    fn parcel(pickup: [f64; 2], delivery: [f64; 2]) -> Parcel {
        Parcel {
            announced: 0.0,
            pickup,
            delivery,
            pickup_window: [0.0, 10_000.0],
            delivery_window: [0.0, 10_000.0],
            pickup_duration: 0.0,
            delivery_duration: 0.0,
        }
    }

    fn vehicle() -> Vehicle {
        Vehicle {
            available_at: 0.0,
            speed: 60.0,
            route: Vec::new(),
        }
    }

    #[test]
    fn descriptor_labels_match_configuration_names() {
        let auction = StrategyDescriptor::Auction {
            route_planner: RoutePlannerKind::Opt2 {
                solver: SolverKind::CheapestInsertion,
            },
            bidder: SolverKind::CheapestInsertion,
        };
        assert_eq!(auction.to_string(), "auction-R-opt2cih-B-cih");
        let central = StrategyDescriptor::Central {
            solver: SolverKind::Random,
        };
        assert_eq!(central.to_string(), "central-rnd");
    }

    #[test]
    fn descriptor_json_round_trips_tagged_form() {
        let json = r#"{"kind":"auction","route_planner":{"kind":"opt2","solver":"cheapest_insertion"},"bidder":"cheapest_insertion"}"#;
        let parsed: StrategyDescriptor = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, StrategyDescriptor::Auction { .. }));
    }

    #[test]
    fn cheapest_insertion_awards_the_nearest_vehicle() {
        let objective = Gendreau06Objective::default();
        let mut fleet = Fleet::new([0.0, 0.0], 480.0, &objective);
        fleet.parcels.push(parcel([1.0, 0.0], [2.0, 0.0]));
        fleet.vehicles.push(Vehicle {
            speed: 10.0,
            ..vehicle()
        });
        fleet.vehicles.push(vehicle());
        let mut coordinator = StrategyDescriptor::Central {
            solver: SolverKind::CheapestInsertion,
        }
        .coordinator(1);
        let award = coordinator.award(&fleet, 0).unwrap();
        // faster vehicle travels the same distance in less time
        assert_eq!(award.vehicle, 1);
        assert_eq!((award.pickup_index, award.delivery_index), (0, 1));
    }

    #[test]
    fn random_solver_is_reproducible_per_seed() {
        let objective = Gendreau06Objective::default();
        let mut fleet = Fleet::new([0.0, 0.0], 480.0, &objective);
        for i in 0..3 {
            let x = f64::from(i) + 1.0;
            fleet.parcels.push(parcel([x, 0.0], [x, 1.0]));
        }
        for _ in 0..3 {
            fleet.vehicles.push(vehicle());
        }
        let descriptor = StrategyDescriptor::Central {
            solver: SolverKind::Random,
        };
        let mut a = descriptor.coordinator(99);
        let mut b = descriptor.coordinator(99);
        assert_eq!(a.award(&fleet, 0), b.award(&fleet, 0));
    }

    #[test]
    fn two_opt_untangles_a_bad_route() {
        let objective = Gendreau06Objective::default();
        let mut fleet = Fleet::new([0.0, 0.0], 480.0, &objective);
        fleet.parcels.push(parcel([1.0, 0.0], [9.0, 0.0]));
        fleet.parcels.push(parcel([2.0, 0.0], [8.0, 0.0]));
        let stop = |parcel, kind| Stop {
            parcel,
            kind,
            release: 0.0,
        };
        let mut v = vehicle();
        v.route = vec![
            stop(0, StopKind::Pickup),
            stop(0, StopKind::Delivery),
            stop(1, StopKind::Pickup),
            stop(1, StopKind::Delivery),
        ];
        fleet.vehicles.push(v);
        fleet.now = -1.0;
        let before = fleet.route_cost(0, &fleet.vehicles[0].route);
        let planned = two_opt(&fleet, 0, 0, fleet.vehicles[0].route.clone());
        assert!(respects_precedence(&planned));
        assert!(fleet.route_cost(0, &planned) < before);
    }
}

//! Vehicle routes and their evaluation inside the reference engine.

use std::cell::Cell;

use crate::objective::{ObjectiveFunction, Statistics};
use crate::scenario::{Point, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    Pickup,
    Delivery,
}

/// One visit on a route. `release` is the time the stop was added; the
/// vehicle never departs towards it earlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stop {
    pub parcel: usize,
    pub kind: StopKind,
    pub release: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    pub announced: f64,
    pub pickup: Point,
    pub delivery: Point,
    pub pickup_window: TimeWindow,
    pub delivery_window: TimeWindow,
    pub pickup_duration: f64,
    pub delivery_duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub available_at: f64,
    pub speed: f64,
    pub route: Vec<Stop>,
}

/// Timing of one route as it would be driven.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouteSchedule {
    pub distance: f64,
    pub travel_time: f64,
    pub pickup_tardiness: f64,
    pub delivery_tardiness: f64,
    pub over_time: f64,
    pub return_time: f64,
    /// Departure time towards each stop.
    pub departures: Vec<f64>,
}

/// A proposed placement of a parcel's pickup and delivery in a route.
///
/// Indices refer to the route after insertion: the pickup lands at
/// `pickup_index` and the delivery at `delivery_index > pickup_index`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Insertion {
    pub vehicle: usize,
    pub pickup_index: usize,
    pub delivery_index: usize,
    pub cost_delta: f64,
}

/// State of the world shared by the coordinator during one run.
pub struct Fleet<'a> {
    pub depot: Point,
    pub end_time: f64,
    pub now: f64,
    pub parcels: Vec<Parcel>,
    pub vehicles: Vec<Vehicle>,
    objective: &'a dyn ObjectiveFunction,
    evaluations: Cell<u64>,
}

fn distance(a: Point, b: Point) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

impl<'a> Fleet<'a> {
    #[must_use]
    pub fn new(depot: Point, end_time: f64, objective: &'a dyn ObjectiveFunction) -> Self {
        Self {
            depot,
            end_time,
            now: 0.0,
            parcels: Vec::new(),
            vehicles: Vec::new(),
            objective,
            evaluations: Cell::new(0),
        }
    }

    /// Number of route evaluations performed so far.
    #[must_use]
    pub fn evaluations(&self) -> u64 {
        self.evaluations.get()
    }

    fn stop_location(&self, stop: &Stop) -> (Point, TimeWindow, f64) {
        let parcel = &self.parcels[stop.parcel];
        match stop.kind {
            StopKind::Pickup => (parcel.pickup, parcel.pickup_window, parcel.pickup_duration),
            StopKind::Delivery => (
                parcel.delivery,
                parcel.delivery_window,
                parcel.delivery_duration,
            ),
        }
    }

    /// Drive `route` with `vehicle`'s speed from the depot and back.
    pub fn schedule(&self, vehicle: &Vehicle, route: &[Stop]) -> RouteSchedule {
        self.evaluations.set(self.evaluations.get() + 1);
        let minutes_per_km = 60.0 / vehicle.speed;
        let mut out = RouteSchedule {
            departures: Vec::with_capacity(route.len()),
            ..RouteSchedule::default()
        };
        let mut position = self.depot;
        let mut time = vehicle.available_at;

        for stop in route {
            let (location, window, duration) = self.stop_location(stop);
            time = time.max(stop.release);
            out.departures.push(time);
            let leg = distance(position, location);
            out.distance += leg;
            out.travel_time += leg * minutes_per_km;
            time += leg * minutes_per_km;
            time = time.max(window[0]);
            let late = (time - window[1]).max(0.0);
            match stop.kind {
                StopKind::Pickup => out.pickup_tardiness += late,
                StopKind::Delivery => out.delivery_tardiness += late,
            }
            time += duration;
            position = location;
        }

        if !route.is_empty() {
            let leg = distance(position, self.depot);
            out.distance += leg;
            out.travel_time += leg * minutes_per_km;
            time += leg * minutes_per_km;
        }
        out.return_time = time;
        out.over_time = (time - self.end_time).max(0.0);
        out
    }

    /// Objective cost of driving `route` with the given vehicle.
    pub fn route_cost(&self, vehicle: usize, route: &[Stop]) -> f64 {
        let schedule = self.schedule(&self.vehicles[vehicle], route);
        let stats = Statistics {
            total_distance: schedule.distance,
            total_travel_time: schedule.travel_time,
            pickup_tardiness: schedule.pickup_tardiness,
            delivery_tardiness: schedule.delivery_tardiness,
            over_time: schedule.over_time,
            ..Statistics::default()
        };
        self.objective.cost(&stats)
    }

    /// Stops of a vehicle's route that the vehicle has already set off for
    /// at the current time. These can no longer be reordered.
    pub fn committed(&self, vehicle: usize) -> usize {
        let v = &self.vehicles[vehicle];
        let schedule = self.schedule(v, &v.route);
        schedule
            .departures
            .iter()
            .take_while(|&&departure| departure <= self.now)
            .count()
    }

    /// Route obtained by applying `insertion` for `parcel` at the current time.
    #[must_use]
    pub fn with_insertion(&self, parcel: usize, insertion: &Insertion) -> Vec<Stop> {
        insert_parcel(
            &self.vehicles[insertion.vehicle].route,
            parcel,
            insertion,
            self.now,
        )
    }

    /// Every feasible insertion of `parcel` into `vehicle`'s uncommitted suffix.
    pub fn candidate_insertions(&self, vehicle: usize, parcel: usize) -> Vec<Insertion> {
        let start = self.committed(vehicle);
        self.candidates_for_route(vehicle, &self.vehicles[vehicle].route, start, parcel, self.now)
    }

    /// Every insertion of `parcel` into `route` at or after `start`, priced
    /// as if `vehicle` drove it.
    pub fn candidates_for_route(
        &self,
        vehicle: usize,
        route: &[Stop],
        start: usize,
        parcel: usize,
        release: f64,
    ) -> Vec<Insertion> {
        let len = route.len();
        let base_cost = self.route_cost(vehicle, route);
        let mut candidates = Vec::new();
        for pickup_index in start..=len {
            for delivery_index in pickup_index + 1..=len + 1 {
                let mut insertion = Insertion {
                    vehicle,
                    pickup_index,
                    delivery_index,
                    cost_delta: 0.0,
                };
                let candidate = insert_parcel(route, parcel, &insertion, release);
                insertion.cost_delta = self.route_cost(vehicle, &candidate) - base_cost;
                candidates.push(insertion);
            }
        }
        candidates
    }
}

/// Copy of `route` with the pickup and delivery of `parcel` placed as `insertion` says.
#[must_use]
pub fn insert_parcel(route: &[Stop], parcel: usize, insertion: &Insertion, release: f64) -> Vec<Stop> {
    let mut out = Vec::with_capacity(route.len() + 2);
    out.extend_from_slice(route);
    out.insert(
        insertion.pickup_index,
        Stop {
            parcel,
            kind: StopKind::Pickup,
            release,
        },
    );
    out.insert(
        insertion.delivery_index,
        Stop {
            parcel,
            kind: StopKind::Delivery,
            release,
        },
    );
    out
}

/// True when every pickup precedes its delivery.
#[must_use]
pub fn respects_precedence(route: &[Stop]) -> bool {
    route.iter().enumerate().all(|(idx, stop)| match stop.kind {
        StopKind::Pickup => route[idx + 1..]
            .iter()
            .any(|s| s.parcel == stop.parcel && s.kind == StopKind::Delivery),
        StopKind::Delivery => !route[idx + 1..]
            .iter()
            .any(|s| s.parcel == stop.parcel && s.kind == StopKind::Pickup),
    })
}

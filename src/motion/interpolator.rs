// src/motion/interpolator.rs - Per-vehicle position/heading animation
//
// One fetch per frame is never needed: between resynchronizations each
// vehicle is animated along its last known route, one segment at a time,
// with frame-level progress derived from a fixed per-segment duration.
use std::collections::HashMap;
use std::time::Duration;

use crate::fleet::model::{Point, Vehicle, Waypoint};

/// Linear interpolation `a + p * (b - a)`.
pub fn lerp(a: Point, b: Point, p: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * p, a.y + (b.y - a.y) * p)
}

/// Signed shortest angular distance from `current` to `target`, in
/// degrees within [-180, 180). Rotating from 350 to 10 yields +20,
/// never -340.
pub fn shortest_arc(current: f64, target: f64) -> f64 {
    ((target - current + 180.0).rem_euclid(360.0)) - 180.0
}

fn normalize_deg(deg: f64) -> f64 {
    deg.rem_euclid(360.0)
}

/// Heading of the segment from `a` to `b`, degrees in [0, 360).
fn bearing(a: Point, b: Point) -> f64 {
    normalize_deg((b.y - a.y).atan2(b.x - a.x).to_degrees())
}

/// An order waypoint reached by a vehicle during a frame, reported on the
/// delivery side-channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitEvent {
    pub vehicle_id: String,
    pub order_id: String,
    pub at_minute: i64,
}

/// Animation state of one vehicle. Holds its own copy of the route so a
/// snapshot swap mid-run can never be observed half-applied.
#[derive(Debug, Clone)]
pub struct VehicleMotion {
    pub vehicle_id: String,
    route: Vec<Waypoint>,
    /// Index of the segment's start waypoint.
    segment: usize,
    elapsed: Duration,
    entry_heading: f64,
    pub position: Point,
    pub heading: f64,
}

impl VehicleMotion {
    fn new(vehicle: &Vehicle) -> Self {
        // Snap to the route head; the optimizer resolves positions as of
        // the fetch minute, so the first waypoint is where the vehicle is.
        let position = vehicle
            .route
            .first()
            .map(|wp| wp.position)
            .unwrap_or(vehicle.position);
        Self {
            vehicle_id: vehicle.id.clone(),
            route: vehicle.route.clone(),
            segment: 0,
            elapsed: Duration::ZERO,
            entry_heading: vehicle.heading,
            position,
            heading: vehicle.heading,
        }
    }

    fn current_segment(&self) -> Option<(&Waypoint, &Waypoint)> {
        let a = self.route.get(self.segment)?;
        let b = self.route.get(self.segment + 1)?;
        Some((a, b))
    }

    /// Advance by one frame. Returns the order waypoints reached.
    fn advance(
        &mut self,
        dt: Duration,
        segment_duration: Duration,
        now_minute: i64,
    ) -> Vec<VisitEvent> {
        let mut visits = Vec::new();
        if self.current_segment().is_none() {
            // Route exhausted or too short to animate: hold in place.
            if let Some(last) = self.route.last() {
                self.position = last.position;
            }
            return visits;
        }
        self.elapsed += dt;
        // A fast frame can complete more than one segment; roll the
        // leftover time into the next one.
        while let Some((a, b)) = self.current_segment() {
            let (a, b) = (a.clone(), b.clone());
            if self.elapsed < segment_duration {
                let p = self.elapsed.as_secs_f64() / segment_duration.as_secs_f64();
                self.position = lerp(a.position, b.position, p);
                let target = bearing(a.position, b.position);
                let delta = shortest_arc(self.entry_heading, target);
                self.heading = normalize_deg(self.entry_heading + delta * p);
                break;
            }
            // Segment complete: land on the end waypoint.
            self.position = b.position;
            self.heading = bearing(a.position, b.position);
            self.entry_heading = self.heading;
            self.elapsed -= segment_duration;
            if let Some(order_id) = &b.order_id {
                let on_time = b.eta_minute.is_none_or(|eta| now_minute <= eta);
                if on_time {
                    visits.push(VisitEvent {
                        vehicle_id: self.vehicle_id.clone(),
                        order_id: order_id.clone(),
                        at_minute: now_minute,
                    });
                }
            }
            self.segment += 1;
            if self.segment + 1 >= self.route.len() {
                // Hold at the final waypoint.
                self.elapsed = Duration::ZERO;
                break;
            }
        }
        visits
    }
}

/// Animates the whole fleet between resynchronizations. Routes are
/// replaced wholesale; a vehicle whose route changed restarts at segment
/// zero rather than mapping old progress onto new waypoints.
#[derive(Debug, Default)]
pub struct MotionInterpolator {
    states: HashMap<String, VehicleMotion>,
}

impl MotionInterpolator {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Replace every vehicle's animation state from a fresh snapshot.
    pub fn load_vehicles(&mut self, vehicles: &[Vehicle]) {
        self.states = vehicles
            .iter()
            .map(|v| (v.id.clone(), VehicleMotion::new(v)))
            .collect();
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Advance every vehicle by one frame, collecting delivery reports.
    pub fn advance_frame(
        &mut self,
        dt: Duration,
        segment_duration: Duration,
        now_minute: i64,
    ) -> Vec<VisitEvent> {
        let mut visits = Vec::new();
        for motion in self.states.values_mut() {
            visits.extend(motion.advance(dt, segment_duration, now_minute));
        }
        visits
    }

    pub fn vehicle(&self, id: &str) -> Option<&VehicleMotion> {
        self.states.get(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehicleMotion> {
        self.states.values()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

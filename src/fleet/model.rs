// src/fleet/model.rs - Typed fleet domain model
use serde::{Deserialize, Serialize};

/// A point on the city grid, in block coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One coordinate node in a vehicle route, optionally bound to an order or
/// marking a warehouse stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Point,
    pub is_warehouse: bool,
    /// Id of the order delivered at this node, if any.
    pub order_id: Option<String>,
    /// Scheduled arrival in virtual minutes; a node without one counts as
    /// visited whenever the vehicle reaches it.
    pub eta_minute: Option<i64>,
}

/// One fleet unit under animation. Replaced wholesale on every successful
/// resynchronization; never patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub route: Vec<Waypoint>,
    pub position: Point,
    /// Degrees in [0, 360).
    pub heading: f64,
}

/// A customer order with a delivery deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Virtual minute the order entered the system.
    pub appearance_minute: i64,
    pub deadline_hours: i64,
    pub delivered: bool,
}

impl Order {
    /// Last virtual minute at which delivery still meets the service level.
    pub fn deadline_minute(&self) -> i64 {
        self.appearance_minute + self.deadline_hours * 60
    }
}

/// A street section closed during a virtual-time interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blockage {
    pub id: String,
    pub from_minute: i64,
    pub until_minute: i64,
    pub nodes: Vec<Point>,
}

/// The unit of atomic replacement: everything the last resynchronization
/// reported. Single writer (the scheduler), many readers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub vehicles: Vec<Vehicle>,
    pub orders: Vec<Order>,
    pub blockages: Vec<Blockage>,
    pub fetched_at_minute: i64,
}

impl FleetSnapshot {
    pub fn vehicle(&self, id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn order_mut(&mut self, id: &str) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == id)
    }
}

// src/fleet/ingest.rs - Wire payload validation
//
// The optimizer reports positions as "x,y" strings. Everything is parsed
// and range-checked here; downstream code only ever sees the typed model.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fleet::model::{Blockage, FleetSnapshot, Order, Point, Vehicle, Waypoint};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Vehicle '{vehicle}': bad position '{raw}'")]
    BadPosition { vehicle: String, raw: String },
    #[error("Vehicle '{vehicle}': bad heading '{raw}'")]
    BadHeading { vehicle: String, raw: String },
    #[error("Vehicle id is empty")]
    EmptyVehicleId,
    #[error("Order '{order}': negative deadline {hours}h")]
    NegativeDeadline { order: String, hours: i64 },
    #[error("Blockage '{blockage}': bad node '{raw}'")]
    BadBlockageNode { blockage: String, raw: String },
}

/// Vehicle as reported on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDto {
    pub id: String,
    /// "x,y"
    pub position: String,
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub route: Vec<WaypointDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointDto {
    /// "x,y"
    pub position: String,
    #[serde(default)]
    pub warehouse: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub eta_minute: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDto {
    pub id: String,
    pub appearance_minute: i64,
    pub deadline_hours: i64,
    #[serde(default)]
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockageDto {
    pub id: String,
    pub from_minute: i64,
    pub until_minute: i64,
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// Orders and blockages seeding a new simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardDto {
    #[serde(default)]
    pub orders: Vec<OrderDto>,
    #[serde(default)]
    pub blockages: Vec<BlockageDto>,
}

/// Everything one resynchronization returns. Orders and blockages ride
/// along in collapse mode; the other modes may leave them empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteFetchDto {
    #[serde(default)]
    pub vehicles: Vec<VehicleDto>,
    #[serde(default)]
    pub orders: Vec<OrderDto>,
    #[serde(default)]
    pub blockages: Vec<BlockageDto>,
}

fn parse_point(raw: &str) -> Option<Point> {
    let (x, y) = raw.split_once(',')?;
    let x: f64 = x.trim().parse().ok()?;
    let y: f64 = y.trim().parse().ok()?;
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(Point::new(x, y))
}

fn normalize_heading(deg: f64) -> f64 {
    let h = deg % 360.0;
    if h < 0.0 { h + 360.0 } else { h }
}

pub fn vehicle_from_dto(dto: &VehicleDto) -> Result<Vehicle, IngestError> {
    if dto.id.trim().is_empty() {
        return Err(IngestError::EmptyVehicleId);
    }
    let position = parse_point(&dto.position).ok_or_else(|| IngestError::BadPosition {
        vehicle: dto.id.clone(),
        raw: dto.position.clone(),
    })?;
    let heading = match &dto.heading {
        Some(raw) => {
            let parsed: f64 = raw.trim().parse().map_err(|_| IngestError::BadHeading {
                vehicle: dto.id.clone(),
                raw: raw.clone(),
            })?;
            if !parsed.is_finite() {
                return Err(IngestError::BadHeading {
                    vehicle: dto.id.clone(),
                    raw: raw.clone(),
                });
            }
            normalize_heading(parsed)
        }
        None => 0.0,
    };
    let mut route = Vec::with_capacity(dto.route.len());
    for wp in &dto.route {
        let position = parse_point(&wp.position).ok_or_else(|| IngestError::BadPosition {
            vehicle: dto.id.clone(),
            raw: wp.position.clone(),
        })?;
        route.push(Waypoint {
            position,
            is_warehouse: wp.warehouse,
            order_id: wp.order_id.clone(),
            eta_minute: wp.eta_minute,
        });
    }
    Ok(Vehicle {
        id: dto.id.clone(),
        route,
        position,
        heading,
    })
}

pub fn order_from_dto(dto: &OrderDto) -> Result<Order, IngestError> {
    if dto.deadline_hours < 0 {
        return Err(IngestError::NegativeDeadline {
            order: dto.id.clone(),
            hours: dto.deadline_hours,
        });
    }
    Ok(Order {
        id: dto.id.clone(),
        appearance_minute: dto.appearance_minute,
        deadline_hours: dto.deadline_hours,
        delivered: dto.delivered,
    })
}

pub fn blockage_from_dto(dto: &BlockageDto) -> Result<Blockage, IngestError> {
    let mut nodes = Vec::with_capacity(dto.nodes.len());
    for raw in &dto.nodes {
        let node = parse_point(raw).ok_or_else(|| IngestError::BadBlockageNode {
            blockage: dto.id.clone(),
            raw: raw.clone(),
        })?;
        nodes.push(node);
    }
    Ok(Blockage {
        id: dto.id.clone(),
        from_minute: dto.from_minute,
        until_minute: dto.until_minute,
        nodes,
    })
}

/// Build a full snapshot from a payload of wire records. Any bad record
/// rejects the whole payload; the caller keeps the previous snapshot in
/// that case.
pub fn snapshot_from_dtos(
    vehicles: &[VehicleDto],
    orders: &[OrderDto],
    blockages: &[BlockageDto],
    fetched_at_minute: i64,
) -> Result<FleetSnapshot, IngestError> {
    let vehicles = vehicles
        .iter()
        .map(vehicle_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    let orders = orders
        .iter()
        .map(order_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    let blockages = blockages
        .iter()
        .map(blockage_from_dto)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FleetSnapshot {
        vehicles,
        orders,
        blockages,
        fetched_at_minute,
    })
}

/// Snapshot from a resynchronization payload.
pub fn snapshot_from_fetch(
    fetch: &RouteFetchDto,
    fetched_at_minute: i64,
) -> Result<FleetSnapshot, IngestError> {
    snapshot_from_dtos(
        &fetch.vehicles,
        &fetch.orders,
        &fetch.blockages,
        fetched_at_minute,
    )
}

/// Snapshot seeding a new simulation: the pending board, no vehicles yet.
pub fn snapshot_from_board(
    board: &BoardDto,
    fetched_at_minute: i64,
) -> Result<FleetSnapshot, IngestError> {
    snapshot_from_dtos(&[], &board.orders, &board.blockages, fetched_at_minute)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(position: &str) -> VehicleDto {
        VehicleDto {
            id: "TA-01".to_string(),
            position: position.to_string(),
            heading: None,
            route: vec![],
        }
    }

    #[test]
    fn test_parse_point_valid() {
        let v = vehicle_from_dto(&dto("12.5, 40")).unwrap();
        assert_eq!(v.position, Point::new(12.5, 40.0));
        assert_eq!(v.heading, 0.0);
    }

    #[test]
    fn test_parse_point_rejects_garbage() {
        assert!(matches!(
            vehicle_from_dto(&dto("12.5;40")),
            Err(IngestError::BadPosition { .. })
        ));
        assert!(matches!(
            vehicle_from_dto(&dto("NaN,1")),
            Err(IngestError::BadPosition { .. })
        ));
    }

    #[test]
    fn test_heading_normalized_into_range() {
        let mut d = dto("0,0");
        d.heading = Some("-90".to_string());
        assert_eq!(vehicle_from_dto(&d).unwrap().heading, 270.0);
        d.heading = Some("725".to_string());
        assert_eq!(vehicle_from_dto(&d).unwrap().heading, 5.0);
    }

    #[test]
    fn test_bad_waypoint_rejects_vehicle() {
        let mut d = dto("0,0");
        d.route.push(WaypointDto {
            position: "oops".to_string(),
            warehouse: false,
            order_id: None,
            eta_minute: None,
        });
        assert!(vehicle_from_dto(&d).is_err());
    }

    #[test]
    fn test_bad_record_rejects_whole_snapshot() {
        let vehicles = vec![dto("1,1"), dto("bad")];
        assert!(snapshot_from_dtos(&vehicles, &[], &[], 0).is_err());
    }

    #[test]
    fn test_negative_deadline_rejected() {
        let order = OrderDto {
            id: "o-9".to_string(),
            appearance_minute: 0,
            deadline_hours: -4,
            delivered: false,
        };
        assert!(matches!(
            order_from_dto(&order),
            Err(IngestError::NegativeDeadline { .. })
        ));
    }
}

// src/fleet/mod.rs
pub mod ingest;
pub mod model;

pub use ingest::{
    BlockageDto, BoardDto, IngestError, OrderDto, RouteFetchDto, VehicleDto, WaypointDto,
    snapshot_from_board, snapshot_from_dtos, snapshot_from_fetch, vehicle_from_dto,
};
pub use model::{Blockage, FleetSnapshot, Order, Point, Vehicle, Waypoint};

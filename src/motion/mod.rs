// src/motion/mod.rs
pub mod interpolator;

pub use interpolator::{MotionInterpolator, VehicleMotion, VisitEvent, lerp, shortest_arc};

// src/collapse.rs - Service-level violation detection
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::fleet::model::Order;

/// The set of orders whose deadline elapsed without delivery, frozen at
/// the moment of first detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseReport {
    pub detected_at_minute: i64,
    pub overdue: Vec<Order>,
}

/// Scans outstanding orders after each resynchronization. The first
/// non-empty report is terminal: the detector latches and never fires
/// again for the same run.
#[derive(Debug, Default)]
pub struct CollapseDetector {
    triggered: bool,
}

impl CollapseDetector {
    pub fn new() -> Self {
        Self { triggered: false }
    }

    /// Re-arm for a fresh simulation run.
    pub fn reset(&mut self) {
        self.triggered = false;
    }

    pub fn has_triggered(&self) -> bool {
        self.triggered
    }

    /// An order is overdue iff it has appeared, its deadline minute has
    /// strictly elapsed, and no vehicle has delivered it.
    pub fn scan(
        &mut self,
        orders: &[Order],
        delivered: &HashSet<String>,
        virtual_minute: i64,
    ) -> Option<CollapseReport> {
        if self.triggered {
            return None;
        }
        let overdue: Vec<Order> = orders
            .iter()
            .filter(|order| {
                order.appearance_minute <= virtual_minute
                    && virtual_minute > order.deadline_minute()
                    && !order.delivered
                    && !delivered.contains(&order.id)
            })
            .cloned()
            .collect();
        if overdue.is_empty() {
            return None;
        }
        self.triggered = true;
        tracing::warn!(
            "Collapse at virtual minute {}: {} overdue order(s)",
            virtual_minute,
            overdue.len()
        );
        Some(CollapseReport {
            detected_at_minute: virtual_minute,
            overdue,
        })
    }
}

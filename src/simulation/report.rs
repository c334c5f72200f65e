//! Run output: allocation snapshots and the final summary.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Achievement (per product) | achieved ÷ plan at the product's final step, 100 % when the plan is 0 |
//! | Average achievement | Mean of the per-product rates |
//! | Utilization | Σ working minutes ÷ (fleet size × elapsed minutes) |
//! | Changeovers | Changeovers started across the fleet |

use serde::Serialize;
use std::fmt;

use crate::models::{
    CapabilityIndex, Equipment, EquipmentStatus, ProductionLedger, Routing, TaskKey,
};

/// Window the capacity column is expressed over.
const CAPACITY_SCALE_MINUTES: f64 = 10.0;

/// One (task, model) line of an allocation snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRow {
    pub time_minutes: u32,
    pub product: String,
    pub process: String,
    pub model: String,
    /// Units of this model sitting at the task (idle or working).
    pub allocated: u32,
    /// Units of this model changing over towards the task.
    pub changeover_inbound: u32,
    pub achieved: u32,
    pub wip: u32,
    /// `allocated × 10 ÷ service_time`.
    pub capacity: f64,
}

impl AllocationRow {
    /// Builds the snapshot rows for one tick.
    ///
    /// Tasks come product by product in route order; models per task are
    /// sorted.
    pub fn snapshot(
        time_minutes: u32,
        routing: &Routing,
        ledger: &ProductionLedger,
        capabilities: &CapabilityIndex,
        fleet: &[Equipment],
    ) -> Vec<Self> {
        let mut rows = Vec::new();
        for task in routing.tasks_in_route_order() {
            if !ledger.contains(task) {
                continue;
            }
            let service_time = capabilities.service_time_or_default(task);
            for model in capabilities.models_for(task) {
                let units = move || fleet.iter().filter(move |e| &e.model == model);
                let allocated = units()
                    .filter(|e| e.status() != EquipmentStatus::Changeover && e.is_resident_at(task))
                    .count() as u32;
                let changeover_inbound = units()
                    .filter(|e| {
                        e.status() == EquipmentStatus::Changeover && e.target() == Some(task)
                    })
                    .count() as u32;
                let capacity = if service_time > 0 {
                    allocated as f64 * CAPACITY_SCALE_MINUTES / service_time as f64
                } else {
                    0.0
                };

                rows.push(Self {
                    time_minutes,
                    product: task.product.clone(),
                    process: task.process.clone(),
                    model: model.clone(),
                    allocated,
                    changeover_inbound,
                    achieved: ledger.achieved(task),
                    wip: ledger.wip(task),
                    capacity,
                });
            }
        }
        rows
    }
}

/// Plan attainment of one product at its final step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAchievement {
    pub product: String,
    pub achieved: u32,
    pub target: u32,
    pub rate_percent: f64,
}

/// End-of-run indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Per-product attainment, sorted by product.
    pub products: Vec<ProductAchievement>,
    pub average_achievement_percent: f64,
    pub utilization_percent: f64,
    pub total_changeovers: u64,
    /// Last simulated tick.
    pub elapsed_minutes: u32,
    /// Whether the run stopped before the horizon because all plans were met.
    pub terminated_early: bool,
}

impl RunSummary {
    /// Computes the summary from the final factory state.
    pub fn calculate(
        ledger: &ProductionLedger,
        routing: &Routing,
        fleet: &[Equipment],
        elapsed_minutes: u32,
        terminated_early: bool,
    ) -> Self {
        let products: Vec<ProductAchievement> = routing
            .products()
            .filter_map(|product| routing.terminal(product))
            .map(|last: &TaskKey| {
                let achieved = ledger.achieved(last);
                let target = ledger.plan(last);
                let rate_percent = if target > 0 {
                    achieved as f64 / target as f64 * 100.0
                } else {
                    100.0
                };
                ProductAchievement {
                    product: last.product.clone(),
                    achieved,
                    target,
                    rate_percent,
                }
            })
            .collect();

        let average_achievement_percent = if products.is_empty() {
            0.0
        } else {
            products.iter().map(|p| p.rate_percent).sum::<f64>() / products.len() as f64
        };

        let worked: u64 = fleet.iter().map(Equipment::total_working_minutes).sum();
        let available = fleet.len() as u64 * elapsed_minutes as u64;
        let utilization_percent = if available > 0 {
            worked as f64 / available as f64 * 100.0
        } else {
            0.0
        };

        Self {
            products,
            average_achievement_percent,
            utilization_percent,
            total_changeovers: fleet.iter().map(|e| e.changeover_count() as u64).sum(),
            elapsed_minutes,
            terminated_early,
        }
    }

    /// Whether every product reached its plan.
    pub fn all_plans_met(&self) -> bool {
        self.products.iter().all(|p| p.achieved >= p.target)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.products {
            writeln!(
                f,
                "  Product {}: {}/{} ({:.1}%)",
                p.product, p.achieved, p.target, p.rate_percent
            )?;
        }
        writeln!(f, "Overall Product Achievement: {:.2}%", self.average_achievement_percent)?;
        writeln!(f, "Equipment Utilization:       {:.2}%", self.utilization_percent)?;
        write!(f, "Total Changeover Count:      {}", self.total_changeovers)
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    pub summary: RunSummary,
    /// Allocation snapshots in tick order (empty when recording is off).
    pub allocations: Vec<AllocationRow>,
}

impl SimulationReport {
    /// Snapshot rows recorded at a given tick.
    pub fn allocations_at(&self, time_minutes: u32) -> impl Iterator<Item = &AllocationRow> {
        self.allocations
            .iter()
            .filter(move |row| row.time_minutes == time_minutes)
    }
}

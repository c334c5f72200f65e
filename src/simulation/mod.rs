//! Tick-driven factory simulation.
//!
//! The [`Simulator`] owns all factory state (ledger, fleet, routing) and
//! advances it one minute per tick:
//!
//! 1. step every unit; completions update achieved counts and feed the
//!    downstream process
//! 2. hand the idle units to the [`Dispatcher`](crate::dispatching::Dispatcher)
//! 3. apply the returned assignments
//! 4. snapshot allocations when any unit changed status
//! 5. stop early once the fleet is quiet and every product's final step
//!    has met its plan
//!
//! # Usage
//!
//! ```
//! use dbr_schedule::dispatching::DbrScheduler;
//! use dbr_schedule::models::Capability;
//! use dbr_schedule::scenario::{ProductionRecord, Scenario};
//! use dbr_schedule::simulation::{SimulationConfig, Simulator};
//!
//! let scenario = Scenario::new("scn_demo")
//!     .with_inventory("CNC", 1)
//!     .with_capability(Capability::new("CNC", "A", "cut", 10))
//!     .with_production(ProductionRecord::new("A", "cut", 1, 5, 5));
//!
//! let mut sim = Simulator::new(&scenario, DbrScheduler::new())
//!     .with_config(SimulationConfig::default().with_total_minutes(600));
//! let report = sim.run().unwrap();
//!
//! assert!(report.summary.terminated_early);
//! assert_eq!(report.summary.elapsed_minutes, 50);
//! assert_eq!(report.summary.average_achievement_percent, 100.0);
//! ```

mod engine;
mod report;

pub use engine::{Simulator, TickOutcome};
pub use report::{AllocationRow, ProductAchievement, RunSummary, SimulationReport};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{EquipmentError, TaskKey};

/// Run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Last tick to simulate (minutes, inclusive).
    pub total_minutes: u32,
    /// Record allocation snapshots.
    pub record_allocations: bool,
}

impl SimulationConfig {
    /// Sets the simulated horizon.
    pub fn with_total_minutes(mut self, minutes: u32) -> Self {
        self.total_minutes = minutes;
        self
    }

    /// Enables or disables allocation snapshots.
    pub fn with_record_allocations(mut self, record: bool) -> Self {
        self.record_allocations = record;
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_minutes: 1440,
            record_allocations: true,
        }
    }
}

/// Errors raised while applying dispatch decisions.
#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("assignment names unknown equipment '{0}'")]
    UnknownEquipment(String),

    #[error("equipment {equipment_id} was assigned {task} but no WIP is queued there")]
    NoWip { equipment_id: String, task: TaskKey },

    #[error(transparent)]
    Equipment(#[from] EquipmentError),
}

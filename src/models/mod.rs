//! Factory domain models.
//!
//! Provides the data types the scheduler and simulator operate on.
//!
//! # Domain Mappings
//!
//! | dbr-schedule | Shop floor | Meaning |
//! |--------------|------------|---------|
//! | `TaskKey` | Station | One process step of one product |
//! | `Routing` | Routing sheet | Ordered steps per product |
//! | `ProductionLedger` | Board | Plan / WIP / achieved per station |
//! | `Equipment` | Machine | Unit with a timed state machine |
//! | `CapabilityIndex` | Skill matrix | Which model runs which station |
//! | `ChangeoverMatrix` | Setup table | Minutes to move between stations |

mod capability;
mod changeover;
mod equipment;
mod ledger;
mod task;

pub use capability::{Capability, CapabilityIndex, DEFAULT_SERVICE_TIME_MINUTES};
pub use changeover::{ChangeoverMatrix, ChangeoverRule, FirstPlacement};
pub use equipment::{Equipment, EquipmentError, EquipmentStatus};
pub use ledger::ProductionLedger;
pub use task::{NextStep, Routing, TaskKey, SHIPPING};

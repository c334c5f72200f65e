//! Dispatching: deciding which idle equipment starts which task.
//!
//! A [`Dispatcher`] is called once per simulation tick with the idle units
//! and a read-only [`DispatchContext`]. It returns assignments; it never
//! mutates factory state. The simulator applies the assignments.
//!
//! The built-in dispatcher is [`DbrScheduler`], a Drum-Buffer-Rope greedy
//! heuristic.
//!
//! # Usage
//!
//! ```
//! use dbr_schedule::dispatching::{DbrPolicy, DbrScheduler, Dispatcher};
//!
//! let scheduler = DbrScheduler::new().with_policy(DbrPolicy::ungated().with_buffer_size(3));
//! assert_eq!(scheduler.name(), "DBR");
//! assert!(scheduler.drum().is_none()); // identified lazily on first dispatch
//! ```
//!
//! # References
//!
//! - Goldratt & Cox (1984), "The Goal"
//! - Schragenheim & Ronen (1990), "Drum-Buffer-Rope shop floor control"

mod context;
mod dbr;
mod drum;
mod policy;

pub use context::{commitments_from, Commitments, DispatchContext};
pub use dbr::{DbrScheduler, ScoreBreakdown};
pub use drum::{DrumAnalysis, DrumPosition};
pub use policy::{DbrPolicy, ResidentScoring};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::models::{Equipment, TaskKey};

/// One dispatch decision: start `task` on `equipment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Equipment to start.
    pub equipment_id: String,
    /// Task to run.
    pub task: TaskKey,
    /// Changeover paid before the work starts (minutes).
    pub changeover_minutes: u32,
}

impl Assignment {
    /// Creates an assignment.
    pub fn new(equipment_id: impl Into<String>, task: TaskKey, changeover_minutes: u32) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            task,
            changeover_minutes,
        }
    }
}

/// A per-tick dispatching policy.
///
/// Implementations may keep state across calls (the DBR scheduler caches
/// its drum), hence `&mut self`.
pub trait Dispatcher: Debug {
    /// Dispatcher name (e.g., "DBR").
    fn name(&self) -> &'static str;

    /// Proposes assignments for the given idle units.
    ///
    /// Units left out of the result stay idle this tick.
    fn dispatch(&mut self, idle: &[&Equipment], context: &DispatchContext<'_>) -> Vec<Assignment>;

    /// Dispatcher description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dispatch(&mut self, idle: &[&Equipment], context: &DispatchContext<'_>) -> Vec<Assignment> {
        (**self).dispatch(idle, context)
    }

    fn description(&self) -> &'static str {
        (**self).description()
    }
}

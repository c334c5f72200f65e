//! Tunable constants of the DBR scoring function.
//!
//! Two resident-scoring variants are in use: a potential-gated one
//! (base 800, only when work is on its way) and an ungated one (base 500,
//! always). Both are presets here; neither is hard-wired.

use serde::{Deserialize, Serialize};

use crate::models::FirstPlacement;

/// Flow score for a unit that stays at a station with no queued WIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidentScoring {
    /// Base score for staying.
    pub base: f64,
    /// Added per unit of station potential.
    pub per_potential: f64,
    /// Only score staying when the station potential is positive.
    pub requires_potential: bool,
}

impl ResidentScoring {
    /// Base 800, granted only when work is heading to the station.
    pub fn potential_gated() -> Self {
        Self {
            base: 800.0,
            per_potential: 5.0,
            requires_potential: true,
        }
    }

    /// Base 500, granted regardless of upstream work.
    pub fn ungated() -> Self {
        Self {
            base: 500.0,
            per_potential: 5.0,
            requires_potential: false,
        }
    }

    /// Flow score for a resident unit, or `None` when staying earns nothing.
    pub fn flow_score(&self, potential: u32) -> Option<f64> {
        if self.requires_potential && potential == 0 {
            return None;
        }
        Some(self.base + self.per_potential * potential as f64)
    }
}

impl Default for ResidentScoring {
    fn default() -> Self {
        Self::potential_gated()
    }
}

/// Configuration of the DBR scheduler.
///
/// Can be read from JSON; missing fields take their defaults.
///
/// ```
/// use dbr_schedule::dispatching::DbrPolicy;
/// use dbr_schedule::models::FirstPlacement;
///
/// let policy: DbrPolicy =
///     serde_json::from_str(r#"{"buffer_size": 8, "first_placement": "default_time"}"#).unwrap();
/// assert_eq!(policy.buffer_size, 8);
/// assert_eq!(policy.first_placement, FirstPlacement::DefaultTime);
/// assert_eq!(policy.balance_penalty, 500.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbrPolicy {
    /// Drum WIP at which upstream release stops (the rope).
    pub buffer_size: u32,
    /// Flow score base when the task has queued WIP.
    pub wip_base: f64,
    /// Flow score per queued unit.
    pub wip_weight: f64,
    /// Flow score for staying resident without queued WIP.
    pub resident: ResidentScoring,
    /// Bonus for a task the unit already sits at.
    pub resident_bonus: f64,
    /// Penalty per changeover minute.
    pub move_penalty_per_minute: f64,
    /// Penalty per unit already committed to the task.
    pub balance_penalty: f64,
    /// Changeover charged to units that were never positioned.
    pub first_placement: FirstPlacement,
}

impl DbrPolicy {
    /// Default constants with potential-gated resident scoring.
    pub fn potential_gated() -> Self {
        Self::default()
    }

    /// Default constants with ungated resident scoring.
    pub fn ungated() -> Self {
        Self {
            resident: ResidentScoring::ungated(),
            ..Self::default()
        }
    }

    /// Sets the drum buffer size.
    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Sets the resident scoring variant.
    pub fn with_resident(mut self, resident: ResidentScoring) -> Self {
        self.resident = resident;
        self
    }

    /// Sets the first-placement changeover policy.
    pub fn with_first_placement(mut self, first_placement: FirstPlacement) -> Self {
        self.first_placement = first_placement;
        self
    }

    /// Sets the per-commitment balance penalty.
    pub fn with_balance_penalty(mut self, penalty: f64) -> Self {
        self.balance_penalty = penalty;
        self
    }
}

impl Default for DbrPolicy {
    fn default() -> Self {
        Self {
            buffer_size: 5,
            wip_base: 1000.0,
            wip_weight: 10.0,
            resident: ResidentScoring::potential_gated(),
            resident_bonus: 200.0,
            move_penalty_per_minute: 15.0,
            balance_penalty: 500.0,
            first_placement: FirstPlacement::Free,
        }
    }
}

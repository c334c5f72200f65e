//! Drum (bottleneck) identification.
//!
//! The drum is the task with the largest planned workload,
//! `plan × service_time`. Every other task is placed relative to it by
//! operation sequence number, which fixes the order in which the DBR
//! scheduler scans tasks.
//!
//! # Reference
//! Schragenheim & Ronen (1990), "Drum-Buffer-Rope shop floor control"

use log::debug;

use crate::models::{CapabilityIndex, ProductionLedger, Routing, TaskKey};

/// Position of a task relative to the drum.
///
/// The derived order (`Drum < Downstream < Upstream`) is the scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrumPosition {
    /// The drum itself.
    Drum,
    /// Later in the line than the drum.
    Downstream,
    /// At or before the drum's stage.
    Upstream,
}

/// The identified drum and its planned workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrumAnalysis {
    drum: TaskKey,
    workload: u64,
}

impl DrumAnalysis {
    /// Finds the drum.
    ///
    /// Scans tasks with positive plan in ledger order; the first task with
    /// the strictly largest workload wins. Without any planned task, falls
    /// back to the first task with a service time, then to the first task.
    /// Returns `None` only for an empty ledger.
    pub fn identify(ledger: &ProductionLedger, capabilities: &CapabilityIndex) -> Option<Self> {
        let mut best: Option<Self> = None;
        for task in ledger.tasks() {
            let plan = ledger.plan(task);
            if plan == 0 {
                continue;
            }
            let workload = plan as u64 * capabilities.service_time_or_default(task) as u64;
            if best.as_ref().map_or(true, |b| workload > b.workload) {
                best = Some(Self {
                    drum: task.clone(),
                    workload,
                });
            }
        }

        let analysis = best.or_else(|| {
            capabilities
                .first_timed_task()
                .or_else(|| ledger.tasks().first())
                .map(|task| Self {
                    drum: task.clone(),
                    workload: 0,
                })
        })?;
        debug!("drum identified: {} (workload {})", analysis.drum, analysis.workload);
        Some(analysis)
    }

    /// Creates an analysis for a known drum.
    pub fn with_drum(drum: TaskKey) -> Self {
        Self { drum, workload: 0 }
    }

    /// The drum task.
    pub fn drum(&self) -> &TaskKey {
        &self.drum
    }

    /// Planned workload of the drum (minutes).
    pub fn workload(&self) -> u64 {
        self.workload
    }

    /// Classifies a task relative to the drum by sequence number.
    pub fn position(&self, task: &TaskKey, routing: &Routing) -> DrumPosition {
        if *task == self.drum {
            return DrumPosition::Drum;
        }
        match (routing.sequence(task), routing.sequence(&self.drum)) {
            (Some(seq), Some(drum_seq)) if seq > drum_seq => DrumPosition::Downstream,
            _ => DrumPosition::Upstream,
        }
    }

    /// Whether `task` precedes the drum on the drum product's own route.
    ///
    /// These are the tasks the rope throttles.
    pub fn feeds_drum(&self, task: &TaskKey, routing: &Routing) -> bool {
        if task.product != self.drum.product {
            return false;
        }
        match (routing.sequence(task), routing.sequence(&self.drum)) {
            (Some(seq), Some(drum_seq)) => seq < drum_seq,
            _ => false,
        }
    }

    /// Orders tasks drum first, downstream next, upstream last. Ties keep
    /// their input order.
    pub fn dispatch_order<'t>(&self, tasks: &'t [TaskKey], routing: &Routing) -> Vec<&'t TaskKey> {
        let mut ordered: Vec<&TaskKey> = tasks.iter().collect();
        ordered.sort_by_key(|t| self.position(t, routing));
        ordered
    }
}

//! Read-only factory snapshot passed to dispatchers.

use std::collections::HashMap;

use crate::models::{
    CapabilityIndex, ChangeoverMatrix, Equipment, ProductionLedger, Routing, TaskKey,
};

/// Number of units committed to each task (working on it, or changing
/// over towards it).
pub type Commitments = HashMap<TaskKey, u32>;

/// Counts commitments by scanning equipment state.
///
/// WORKING units count against their current task, CHANGEOVER units
/// against their destination.
pub fn commitments_from<'a, I>(fleet: I) -> Commitments
where
    I: IntoIterator<Item = &'a Equipment>,
{
    let mut commitments = Commitments::new();
    for eq in fleet {
        if let Some(task) = eq.committed_task() {
            *commitments.entry(task.clone()).or_insert(0) += 1;
        }
    }
    commitments
}

/// Runtime factory state visible to a dispatcher for one tick.
///
/// Everything is borrowed from the simulator; dispatchers that need to
/// consume WIP or commitments provisionally do so on local copies.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    /// Current simulation time (minutes).
    pub time_minutes: u32,
    /// Plan / WIP / achieved.
    pub ledger: &'a ProductionLedger,
    /// Product routes.
    pub routing: &'a Routing,
    /// Capability index and service times.
    pub capabilities: &'a CapabilityIndex,
    /// Changeover times.
    pub changeovers: &'a ChangeoverMatrix,
    /// Units committed per task at the start of the tick.
    pub commitments: &'a Commitments,
}

impl<'a> DispatchContext<'a> {
    /// Creates a context at t=0.
    pub fn new(
        ledger: &'a ProductionLedger,
        routing: &'a Routing,
        capabilities: &'a CapabilityIndex,
        changeovers: &'a ChangeoverMatrix,
        commitments: &'a Commitments,
    ) -> Self {
        Self {
            time_minutes: 0,
            ledger,
            routing,
            capabilities,
            changeovers,
            commitments,
        }
    }

    /// Sets the current time.
    pub fn at_time(mut self, time_minutes: u32) -> Self {
        self.time_minutes = time_minutes;
        self
    }

    /// Units committed to a task.
    pub fn committed(&self, task: &TaskKey) -> u32 {
        self.commitments.get(task).copied().unwrap_or(0)
    }

    /// Service time of a task (default when undefined).
    pub fn service_time(&self, task: &TaskKey) -> u32 {
        self.capabilities.service_time_or_default(task)
    }
}

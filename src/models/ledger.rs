//! Production ledger: plan, WIP and achieved quantities per task.
//!
//! The ledger is the single place where unit counts change. WIP only
//! moves through [`ProductionLedger::take_wip`] and
//! [`ProductionLedger::record_completion`], which keeps WIP non-negative
//! and achieved counts monotonic.

use std::collections::HashMap;

use super::{NextStep, Routing, TaskKey};

/// Plan / WIP / achieved bookkeeping for every task.
///
/// Task iteration order is the order in which tasks were registered,
/// which for a loaded scenario is the production-record order.
#[derive(Debug, Clone, Default)]
pub struct ProductionLedger {
    tasks: Vec<TaskKey>,
    plan: HashMap<TaskKey, u32>,
    wip: HashMap<TaskKey, u32>,
    achieved: HashMap<TaskKey, u32>,
}

impl ProductionLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task with its plan target and initial WIP.
    ///
    /// Registering an existing task overwrites its plan and WIP but keeps
    /// its position and achieved count.
    pub fn register(&mut self, task: TaskKey, plan: u32, wip: u32) {
        if !self.plan.contains_key(&task) {
            self.tasks.push(task.clone());
            self.achieved.insert(task.clone(), 0);
        }
        self.plan.insert(task.clone(), plan);
        self.wip.insert(task, wip);
    }

    /// Builder: registers a task and returns self.
    pub fn with_task(mut self, task: TaskKey, plan: u32, wip: u32) -> Self {
        self.register(task, plan, wip);
        self
    }

    /// Tasks in registration order.
    pub fn tasks(&self) -> &[TaskKey] {
        &self.tasks
    }

    /// Whether the task is known to the ledger.
    pub fn contains(&self, task: &TaskKey) -> bool {
        self.plan.contains_key(task)
    }

    /// Plan target (0 for unknown tasks).
    pub fn plan(&self, task: &TaskKey) -> u32 {
        self.plan.get(task).copied().unwrap_or(0)
    }

    /// Queued WIP (0 for unknown tasks).
    pub fn wip(&self, task: &TaskKey) -> u32 {
        self.wip.get(task).copied().unwrap_or(0)
    }

    /// Completed units (0 for unknown tasks).
    pub fn achieved(&self, task: &TaskKey) -> u32 {
        self.achieved.get(task).copied().unwrap_or(0)
    }

    /// Snapshot of the whole WIP map.
    pub fn wip_map(&self) -> &HashMap<TaskKey, u32> {
        &self.wip
    }

    /// Removes one unit of WIP from a task.
    ///
    /// Returns `false` and leaves the ledger untouched when the task has
    /// no WIP.
    pub fn take_wip(&mut self, task: &TaskKey) -> bool {
        match self.wip.get_mut(task) {
            Some(qty) if *qty > 0 => {
                *qty -= 1;
                true
            }
            _ => false,
        }
    }

    /// Records one completed unit of `task` and forwards it downstream.
    ///
    /// Returns the step the unit moved to, or `None` if the task is not
    /// routed (the completion is still counted).
    pub fn record_completion<'r>(
        &mut self,
        task: &TaskKey,
        routing: &'r Routing,
    ) -> Option<NextStep<'r>> {
        *self.achieved.entry(task.clone()).or_insert(0) += 1;
        let next = routing.next_step(task)?;
        if let NextStep::Process(downstream) = next {
            *self.wip.entry(downstream.clone()).or_insert(0) += 1;
        }
        Some(next)
    }

    /// Whether every product's terminal process has met its plan.
    pub fn terminal_plans_met(&self, routing: &Routing) -> bool {
        routing.products().all(|product| match routing.terminal(product) {
            Some(last) => self.achieved(last) >= self.plan(last),
            None => true,
        })
    }

    /// Total WIP across all tasks.
    pub fn total_wip(&self) -> u64 {
        self.wip.values().map(|&q| q as u64).sum()
    }
}

//! Equipment capability records and the prebuilt capability index.
//!
//! A capability says that an equipment model can run a given
//! (product, process) task, at what service time, and how many units of
//! that model start the run already positioned there.
//!
//! The index is built once per scenario so that the per-tick capability
//! test is a single hash lookup on (model, task).

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::TaskKey;
use crate::scenario::whole_number;

/// Service time used when a task has no feasible capability (minutes).
pub const DEFAULT_SERVICE_TIME_MINUTES: u32 = 10;

/// One capability record: (model, product, process) → service time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Equipment model.
    pub model: String,
    /// Product identifier.
    pub product: String,
    /// Process identifier.
    pub process: String,
    /// Minutes per unit.
    #[serde(rename = "st", alias = "service_time_minutes", deserialize_with = "whole_number")]
    pub service_time_minutes: u32,
    /// Whether the model can actually run this task.
    #[serde(default = "default_feasible")]
    pub feasible: bool,
    /// Units of this model positioned at the task when the run starts.
    #[serde(default, deserialize_with = "whole_number")]
    pub initial_count: u32,
}

fn default_feasible() -> bool {
    true
}

impl Capability {
    /// Creates a feasible capability with no initial placement.
    pub fn new(
        model: impl Into<String>,
        product: impl Into<String>,
        process: impl Into<String>,
        service_time_minutes: u32,
    ) -> Self {
        Self {
            model: model.into(),
            product: product.into(),
            process: process.into(),
            service_time_minutes,
            feasible: true,
            initial_count: 0,
        }
    }

    /// Sets the initial placement count.
    pub fn with_initial_count(mut self, count: u32) -> Self {
        self.initial_count = count;
        self
    }

    /// Marks the capability as infeasible.
    pub fn infeasible(mut self) -> Self {
        self.feasible = false;
        self
    }

    /// Task this capability covers.
    pub fn task(&self) -> TaskKey {
        TaskKey::new(&self.product, &self.process)
    }
}

/// Lookup structure over feasible capabilities.
///
/// Infeasible records are dropped at build time. The service-time table
/// keeps the first feasible record per task, in record order.
#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    capable: HashSet<(String, TaskKey)>,
    service_times: HashMap<TaskKey, u32>,
    service_order: Vec<TaskKey>,
    models_by_task: HashMap<TaskKey, Vec<String>>,
}

impl CapabilityIndex {
    /// Builds the index from capability records.
    pub fn from_capabilities(capabilities: &[Capability]) -> Self {
        let mut index = Self::default();
        for cap in capabilities.iter().filter(|c| c.feasible) {
            let task = cap.task();
            if !index.service_times.contains_key(&task) {
                index.service_times.insert(task.clone(), cap.service_time_minutes);
                index.service_order.push(task.clone());
            }
            let models = index.models_by_task.entry(task.clone()).or_default();
            if let Err(pos) = models.binary_search(&cap.model) {
                models.insert(pos, cap.model.clone());
            }
            index.capable.insert((cap.model.clone(), task));
        }
        index
    }

    /// Whether `model` can run `task`.
    pub fn is_capable(&self, model: &str, task: &TaskKey) -> bool {
        // Unknown task: skip building the key.
        if !self.service_times.contains_key(task) {
            return false;
        }
        self.capable.contains(&(model.to_string(), task.clone()))
    }

    /// Service time of a task, if any feasible capability defines it.
    pub fn service_time(&self, task: &TaskKey) -> Option<u32> {
        self.service_times.get(task).copied()
    }

    /// Service time of a task, falling back to [`DEFAULT_SERVICE_TIME_MINUTES`].
    pub fn service_time_or_default(&self, task: &TaskKey) -> u32 {
        self.service_time(task).unwrap_or(DEFAULT_SERVICE_TIME_MINUTES)
    }

    /// First task of the service-time table.
    pub fn first_timed_task(&self) -> Option<&TaskKey> {
        self.service_order.first()
    }

    /// Models able to run a task, sorted and de-duplicated.
    pub fn models_for(&self, task: &TaskKey) -> &[String] {
        self.models_by_task
            .get(task)
            .map(|m| m.as_slice())
            .unwrap_or(&[])
    }

    /// Number of (model, task) pairs in the index.
    pub fn len(&self) -> usize {
        self.capable.len()
    }

    /// Whether the index has no feasible capability.
    pub fn is_empty(&self) -> bool {
        self.capable.is_empty()
    }
}

//! Task identity and product routing.
//!
//! A task is one (product, process) station on the factory floor. Each
//! product visits its processes in a strict order given by operation
//! sequence numbers; the last process routes finished units to the
//! virtual [`SHIPPING`] sink.
//!
//! # Reference
//! Goldratt & Cox (1984), "The Goal", Ch. 25 (flow through dependent stations)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name of the virtual sink after a product's terminal process.
pub const SHIPPING: &str = "SHIPPING";

/// A production task: one process step of one product.
///
/// Ordering is lexicographic on (product, process), which is the
/// deterministic order used wherever tasks are grouped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    /// Product identifier.
    pub product: String,
    /// Process (station) identifier.
    pub process: String,
}

impl TaskKey {
    /// Creates a new task key.
    pub fn new(product: impl Into<String>, process: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            process: process.into(),
        }
    }

    /// Whether this task belongs to the given product.
    #[inline]
    pub fn is_product(&self, product: &str) -> bool {
        self.product == product
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.product, self.process)
    }
}

/// Where a unit goes after finishing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep<'a> {
    /// Queued as WIP at the next process of the same product.
    Process(&'a TaskKey),
    /// Leaves the factory.
    Shipping,
}

/// Per-product operation sequences.
///
/// Built once from (task, sequence number) pairs. Within a product the
/// steps are kept sorted by sequence number; products are kept in
/// lexicographic order.
#[derive(Debug, Clone, Default)]
pub struct Routing {
    sequence: HashMap<TaskKey, i32>,
    /// product → steps sorted by sequence number.
    routes: Vec<(String, Vec<TaskKey>)>,
}

impl Routing {
    /// Creates an empty routing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a routing from (task, operation sequence) pairs.
    ///
    /// Steps sharing a sequence number keep their input order; the
    /// validation layer rejects such input before it reaches here.
    pub fn from_steps<'a, I>(steps: I) -> Self
    where
        I: IntoIterator<Item = (&'a TaskKey, i32)>,
    {
        let mut routing = Self::new();
        for (task, seq) in steps {
            routing.add_step(task.clone(), seq);
        }
        routing
    }

    /// Adds a step to its product's route.
    pub fn add_step(&mut self, task: TaskKey, seq: i32) {
        self.sequence.insert(task.clone(), seq);

        let idx = match self.routes.binary_search_by(|(p, _)| p.as_str().cmp(&task.product)) {
            Ok(idx) => idx,
            Err(idx) => {
                self.routes.insert(idx, (task.product.clone(), Vec::new()));
                idx
            }
        };
        let sequence = &self.sequence;
        let route = &mut self.routes[idx].1;
        let pos = route.partition_point(|t| sequence.get(t).copied().unwrap_or(i32::MIN) <= seq);
        route.insert(pos, task);
    }

    /// Operation sequence number of a task.
    pub fn sequence(&self, task: &TaskKey) -> Option<i32> {
        self.sequence.get(task).copied()
    }

    /// Products in lexicographic order.
    pub fn products(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(p, _)| p.as_str())
    }

    /// Steps of a product, in route order.
    pub fn route(&self, product: &str) -> &[TaskKey] {
        self.routes
            .iter()
            .find(|(p, _)| p == product)
            .map(|(_, steps)| steps.as_slice())
            .unwrap_or(&[])
    }

    /// Terminal (last) step of a product.
    pub fn terminal(&self, product: &str) -> Option<&TaskKey> {
        self.route(product).last()
    }

    /// Where a unit finishing `task` goes next.
    ///
    /// Returns `None` when the task is not part of any route.
    pub fn next_step(&self, task: &TaskKey) -> Option<NextStep<'_>> {
        let route = self.route(&task.product);
        let idx = route.iter().position(|t| t == task)?;
        Some(match route.get(idx + 1) {
            Some(next) => NextStep::Process(next),
            None => NextStep::Shipping,
        })
    }

    /// Steps of the same product that come before `task`.
    pub fn upstream_of<'a>(&'a self, task: &TaskKey) -> impl Iterator<Item = &'a TaskKey> + 'a {
        let seq = self.sequence(task);
        let product = task.product.clone();
        self.route(&product)
            .iter()
            .filter(move |t| match (seq, self.sequence(t)) {
                (Some(limit), Some(s)) => s < limit,
                _ => false,
            })
    }

    /// All tasks sorted by product, then sequence number.
    pub fn tasks_in_route_order(&self) -> impl Iterator<Item = &TaskKey> {
        self.routes.iter().flat_map(|(_, steps)| steps.iter())
    }

    /// Number of tasks across all routes.
    pub fn task_count(&self) -> usize {
        self.sequence.len()
    }
}

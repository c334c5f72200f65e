//! Sequence-dependent changeover times.
//!
//! Moving a unit from one (product, process) to another costs a number of
//! minutes given by an explicit rule, or the scenario-wide default when no
//! rule matches. Staying put costs nothing.
//!
//! # Reference
//! Allahverdi et al. (2008), "A survey of scheduling problems with
//! setup times or costs"

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Equipment, TaskKey};
use crate::scenario::whole_number;

/// How to charge the first placement of a unit that was never positioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstPlacement {
    /// Unpositioned units start work without a changeover.
    #[default]
    Free,
    /// Unpositioned units pay the scenario default changeover time.
    DefaultTime,
}

/// One explicit changeover rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeoverRule {
    pub from_product: String,
    pub from_process: String,
    pub to_product: String,
    pub to_process: String,
    /// Changeover duration (minutes).
    #[serde(rename = "time", alias = "time_minutes", deserialize_with = "whole_number")]
    pub time_minutes: u32,
}

impl ChangeoverRule {
    /// Creates a rule from one task to another.
    pub fn new(from: &TaskKey, to: &TaskKey, time_minutes: u32) -> Self {
        Self {
            from_product: from.product.clone(),
            from_process: from.process.clone(),
            to_product: to.product.clone(),
            to_process: to.process.clone(),
            time_minutes,
        }
    }

    fn endpoints(&self) -> (TaskKey, TaskKey) {
        (
            TaskKey::new(&self.from_product, &self.from_process),
            TaskKey::new(&self.to_product, &self.to_process),
        )
    }
}

/// Changeover lookup table: (from task, to task) → minutes.
#[derive(Debug, Clone, Default)]
pub struct ChangeoverMatrix {
    transitions: HashMap<(TaskKey, TaskKey), u32>,
    /// Minutes charged when no explicit rule matches.
    pub default_minutes: u32,
}

impl ChangeoverMatrix {
    /// Creates an empty matrix with the given default time.
    pub fn new(default_minutes: u32) -> Self {
        Self {
            transitions: HashMap::new(),
            default_minutes,
        }
    }

    /// Builds a matrix from rules. When several rules share endpoints the
    /// first one wins.
    pub fn from_rules(default_minutes: u32, rules: &[ChangeoverRule]) -> Self {
        let mut matrix = Self::new(default_minutes);
        for rule in rules {
            matrix
                .transitions
                .entry(rule.endpoints())
                .or_insert(rule.time_minutes);
        }
        matrix
    }

    /// Defines (or replaces) a transition time.
    pub fn set_transition(&mut self, from: TaskKey, to: TaskKey, minutes: u32) {
        self.transitions.insert((from, to), minutes);
    }

    /// Builder form of [`set_transition`](Self::set_transition).
    pub fn with_transition(mut self, from: TaskKey, to: TaskKey, minutes: u32) -> Self {
        self.set_transition(from, to, minutes);
        self
    }

    /// Time to move between two tasks.
    ///
    /// Same task → 0. Otherwise the explicit rule, else the default.
    pub fn get_transition(&self, from: &TaskKey, to: &TaskKey) -> u32 {
        if from == to {
            return 0;
        }
        self.transitions
            .get(&(from.clone(), to.clone()))
            .copied()
            .unwrap_or(self.default_minutes)
    }

    /// Changeover a unit must pay to start `to`.
    pub fn cost(&self, equipment: &Equipment, to: &TaskKey, first: FirstPlacement) -> u32 {
        match equipment.current() {
            Some(from) => self.get_transition(from, to),
            None => match first {
                FirstPlacement::Free => 0,
                FirstPlacement::DefaultTime => self.default_minutes,
            },
        }
    }

    /// Number of explicit rules.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

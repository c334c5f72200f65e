//! Seeded random scenario generation.
//!
//! Produces structurally valid bundles for experiments and tests: every
//! task has at least one capable model, initial placements never exceed
//! the inventory, and each product's full plan starts queued at its first
//! process.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

use super::{ProductionRecord, Scenario};
use crate::models::{Capability, ChangeoverRule, TaskKey};

/// Builder for random scenarios.
///
/// # Example
///
/// ```
/// use dbr_schedule::scenario::ScenarioGenerator;
///
/// let a = ScenarioGenerator::new().with_products(2).with_seed(7).generate();
/// let b = ScenarioGenerator::new().with_products(2).with_seed(7).generate();
/// assert_eq!(a, b);
/// assert!(a.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioGenerator {
    name: String,
    products: usize,
    processes: usize,
    models: usize,
    units_per_model: RangeInclusive<u32>,
    service_time: RangeInclusive<u32>,
    plan: RangeInclusive<u32>,
    default_changeover: u32,
    rule_probability: f64,
    rule_time: RangeInclusive<u32>,
    seed: u64,
}

impl ScenarioGenerator {
    /// Creates a generator with a small three-product line.
    pub fn new() -> Self {
        Self {
            name: "scn_generated".into(),
            products: 3,
            processes: 3,
            models: 3,
            units_per_model: 1..=4,
            service_time: 5..=30,
            plan: 10..=60,
            default_changeover: 30,
            rule_probability: 0.2,
            rule_time: 5..=60,
            seed: 42,
        }
    }

    /// Sets the scenario name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the number of products.
    pub fn with_products(mut self, products: usize) -> Self {
        self.products = products;
        self
    }

    /// Sets the route length of every product.
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    /// Sets the number of equipment models.
    pub fn with_models(mut self, models: usize) -> Self {
        self.models = models.max(1);
        self
    }

    /// Sets the range of units per model.
    pub fn with_units_per_model(mut self, range: RangeInclusive<u32>) -> Self {
        self.units_per_model = range;
        self
    }

    /// Sets the service time range (minutes).
    pub fn with_service_time(mut self, range: RangeInclusive<u32>) -> Self {
        self.service_time = range;
        self
    }

    /// Sets the plan quantity range.
    pub fn with_plan(mut self, range: RangeInclusive<u32>) -> Self {
        self.plan = range;
        self
    }

    /// Sets the default changeover time (minutes).
    pub fn with_default_changeover(mut self, minutes: u32) -> Self {
        self.default_changeover = minutes;
        self
    }

    /// Sets the probability that a task pair gets an explicit changeover rule.
    pub fn with_rule_probability(mut self, probability: f64) -> Self {
        self.rule_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generates the scenario. Equal settings give equal scenarios.
    pub fn generate(&self) -> Scenario {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut scenario =
            Scenario::new(self.name.clone()).with_default_changeover(self.default_changeover);

        let models: Vec<String> = (1..=self.models).map(|m| format!("EQ{m:02}")).collect();
        for model in &models {
            let count = rng.random_range(self.units_per_model.clone());
            scenario = scenario.with_inventory(model, count);
        }

        let mut tasks = Vec::with_capacity(self.products * self.processes);
        for p in 1..=self.products {
            let product = format!("PRD{p:02}");
            let plan = rng.random_range(self.plan.clone());
            for i in 0..self.processes {
                let process = format!("P{}", i + 1);
                let wip = if i == 0 { plan } else { 0 };
                let seq = (i as i32 + 1) * 10;
                scenario = scenario.with_production(ProductionRecord::new(
                    &product, &process, seq, wip, plan,
                ));
                tasks.push(TaskKey::new(&product, &process));
            }
        }

        // Capability matrix, at least one capable model per task.
        for task in &tasks {
            let mut capable: Vec<usize> =
                (0..models.len()).filter(|_| rng.random_bool(0.5)).collect();
            if capable.is_empty() {
                capable.push(rng.random_range(0..models.len()));
            }
            for m in capable {
                let st = rng.random_range(self.service_time.clone());
                scenario = scenario.with_capability(Capability::new(
                    &models[m],
                    &task.product,
                    &task.process,
                    st,
                ));
            }
        }

        // Spread each model's units over its capabilities.
        let counts: Vec<(String, u32)> = scenario
            .inventory
            .iter()
            .map(|i| (i.model.clone(), i.count))
            .collect();
        for (model, count) in counts {
            let mut left = count;
            for cap in scenario.capabilities.iter_mut().filter(|c| c.model == model) {
                if left == 0 {
                    break;
                }
                let n = rng.random_range(0..=left);
                cap.initial_count = n;
                left -= n;
            }
        }

        for from in &tasks {
            for to in &tasks {
                if from != to && rng.random_bool(self.rule_probability) {
                    let minutes = rng.random_range(self.rule_time.clone());
                    scenario = scenario.with_changeover_rule(ChangeoverRule::new(from, to, minutes));
                }
            }
        }

        scenario
    }
}

impl Default for ScenarioGenerator {
    fn default() -> Self {
        Self::new()
    }
}

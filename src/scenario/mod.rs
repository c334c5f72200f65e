//! Scenario bundles: the four record sets a simulation starts from.
//!
//! | Record set | File | Content |
//! |------------|------|---------|
//! | Inventory | `equipment_inventory.json` | units per model |
//! | Capability | `equipment_capability.json` | model × task feasibility, service time, initial placement |
//! | Plan / WIP | `plan_wip.json` | route position, initial WIP and plan per task |
//! | Changeover | `changeover_rules.json` | default time and explicit rules |
//!
//! A [`Scenario`] turns these records into the runtime structures the
//! simulator owns: [`Routing`], [`ProductionLedger`], [`CapabilityIndex`],
//! [`ChangeoverMatrix`] and the equipment fleet.

mod generator;
mod loader;

pub use generator::ScenarioGenerator;
pub use loader::{list_scenarios, load_scenario, ScenarioError};

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::{
    Capability, CapabilityIndex, ChangeoverMatrix, ChangeoverRule, Equipment, ProductionLedger,
    Routing, TaskKey,
};
use crate::validation::{validate_scenario, ValidationResult};

/// Units of one equipment model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub model: String,
    #[serde(deserialize_with = "whole_number")]
    pub count: u32,
}

/// One task of the production plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub product: String,
    pub process: String,
    /// Position of the process in the product's route.
    #[serde(rename = "oper_seq", alias = "operation_sequence")]
    pub operation_sequence: i32,
    /// Units queued at the start of the run.
    #[serde(rename = "wip", alias = "wip_quantity", deserialize_with = "whole_number")]
    pub wip_quantity: u32,
    /// Target output.
    #[serde(rename = "plan", alias = "plan_quantity", deserialize_with = "whole_number")]
    pub plan_quantity: u32,
}

impl ProductionRecord {
    /// Creates a production record.
    pub fn new(
        product: impl Into<String>,
        process: impl Into<String>,
        operation_sequence: i32,
        wip_quantity: u32,
        plan_quantity: u32,
    ) -> Self {
        Self {
            product: product.into(),
            process: process.into(),
            operation_sequence,
            wip_quantity,
            plan_quantity,
        }
    }

    /// Task this record describes.
    pub fn task(&self) -> TaskKey {
        TaskKey::new(&self.product, &self.process)
    }
}

/// Changeover default and explicit rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeoverTable {
    #[serde(rename = "default_time", alias = "default_time_minutes", deserialize_with = "whole_number")]
    pub default_time_minutes: u32,
    #[serde(default)]
    pub rules: Vec<ChangeoverRule>,
}

/// A complete scenario bundle.
///
/// # Example
///
/// ```
/// use dbr_schedule::models::Capability;
/// use dbr_schedule::scenario::{ProductionRecord, Scenario};
///
/// let scenario = Scenario::new("scn_demo")
///     .with_inventory("CNC", 2)
///     .with_capability(Capability::new("CNC", "A", "cut", 10).with_initial_count(1))
///     .with_production(ProductionRecord::new("A", "cut", 1, 50, 50));
///
/// assert!(scenario.validate().is_ok());
/// let fleet = scenario.build_fleet();
/// assert_eq!(fleet.len(), 2);
/// assert!(fleet[0].current().is_some()); // pre-positioned
/// assert!(fleet[1].current().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name (directory name when loaded from disk).
    pub name: String,
    pub inventory: Vec<InventoryItem>,
    pub capabilities: Vec<Capability>,
    pub production: Vec<ProductionRecord>,
    pub changeovers: ChangeoverTable,
}

impl Scenario {
    /// Creates an empty scenario.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds an inventory line.
    pub fn with_inventory(mut self, model: impl Into<String>, count: u32) -> Self {
        self.inventory.push(InventoryItem {
            model: model.into(),
            count,
        });
        self
    }

    /// Adds a capability record.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }

    /// Adds a production record.
    pub fn with_production(mut self, record: ProductionRecord) -> Self {
        self.production.push(record);
        self
    }

    /// Sets the default changeover time.
    pub fn with_default_changeover(mut self, minutes: u32) -> Self {
        self.changeovers.default_time_minutes = minutes;
        self
    }

    /// Adds an explicit changeover rule.
    pub fn with_changeover_rule(mut self, rule: ChangeoverRule) -> Self {
        self.changeovers.rules.push(rule);
        self
    }

    /// Checks the bundle's structural integrity.
    pub fn validate(&self) -> ValidationResult {
        validate_scenario(self)
    }

    /// Per-product routes from the production records.
    pub fn routing(&self) -> Routing {
        let mut routing = Routing::new();
        for record in &self.production {
            routing.add_step(record.task(), record.operation_sequence);
        }
        routing
    }

    /// Initial plan / WIP ledger, in record order.
    pub fn ledger(&self) -> ProductionLedger {
        let mut ledger = ProductionLedger::new();
        for record in &self.production {
            ledger.register(record.task(), record.plan_quantity, record.wip_quantity);
        }
        ledger
    }

    /// Capability index over the feasible records.
    pub fn capability_index(&self) -> CapabilityIndex {
        CapabilityIndex::from_capabilities(&self.capabilities)
    }

    /// Changeover lookup table.
    pub fn changeover_matrix(&self) -> ChangeoverMatrix {
        ChangeoverMatrix::from_rules(self.changeovers.default_time_minutes, &self.changeovers.rules)
    }

    /// Creates the equipment fleet.
    ///
    /// Units are numbered `"{model}_{n}"` per inventory line. Each unit takes
    /// the first feasible capability of its model that still has initial
    /// placements left; the rest start unpositioned.
    pub fn build_fleet(&self) -> Vec<Equipment> {
        let mut placements: Vec<(&Capability, u32)> = self
            .capabilities
            .iter()
            .filter(|c| c.feasible && c.initial_count > 0)
            .map(|c| (c, c.initial_count))
            .collect();

        let mut fleet = Vec::with_capacity(self.total_equipment());
        for item in &self.inventory {
            for n in 1..=item.count {
                let mut equipment = Equipment::new(format!("{}_{}", item.model, n), &item.model);
                if let Some((cap, left)) = placements
                    .iter_mut()
                    .find(|(cap, left)| *left > 0 && cap.model == item.model)
                {
                    *left -= 1;
                    equipment = equipment.with_position(cap.task());
                }
                fleet.push(equipment);
            }
        }
        fleet
    }

    /// Total units across the inventory.
    pub fn total_equipment(&self) -> usize {
        self.inventory.iter().map(|i| i.count as usize).sum()
    }

    /// Distinct products, sorted.
    pub fn products(&self) -> Vec<String> {
        let mut products: Vec<String> = self.production.iter().map(|p| p.product.clone()).collect();
        products.sort();
        products.dedup();
        products
    }
}

/// Reads a non-negative whole number written either as an integer or as
/// an integral float (`10` or `10.0`).
pub(crate) fn whole_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

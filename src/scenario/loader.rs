//! Reading and writing scenario bundles as JSON files.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{ChangeoverTable, InventoryItem, ProductionRecord, Scenario};
use crate::models::Capability;
use crate::validation::ValidationError;

const INVENTORY_FILE: &str = "equipment_inventory.json";
const CAPABILITY_FILE: &str = "equipment_capability.json";
const PLAN_WIP_FILE: &str = "plan_wip.json";
const CHANGEOVER_FILE: &str = "changeover_rules.json";

/// Scenario directories are recognized by this prefix.
const SCENARIO_PREFIX: &str = "scn";

/// Errors raised while loading or writing a scenario bundle.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("scenario '{name}' is invalid: {}", summarize(.errors))]
    Invalid {
        name: String,
        errors: Vec<ValidationError>,
    },
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Serialize, Deserialize)]
struct InventoryFile {
    inventory: Vec<InventoryItem>,
}

#[derive(Serialize, Deserialize)]
struct CapabilityFile {
    capabilities: Vec<Capability>,
}

#[derive(Serialize, Deserialize)]
struct PlanWipFile {
    production: Vec<ProductionRecord>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ScenarioError> {
    let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ScenarioError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ScenarioError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ScenarioError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads and validates the scenario bundle stored in `dir`.
///
/// The scenario is named after the directory.
pub fn load_scenario(dir: impl AsRef<Path>) -> Result<Scenario, ScenarioError> {
    let dir = dir.as_ref();
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let inventory: InventoryFile = read_json(&dir.join(INVENTORY_FILE))?;
    let capabilities: CapabilityFile = read_json(&dir.join(CAPABILITY_FILE))?;
    let plan_wip: PlanWipFile = read_json(&dir.join(PLAN_WIP_FILE))?;
    let changeovers: ChangeoverTable = read_json(&dir.join(CHANGEOVER_FILE))?;

    let scenario = Scenario {
        name,
        inventory: inventory.inventory,
        capabilities: capabilities.capabilities,
        production: plan_wip.production,
        changeovers,
    };

    if let Err(errors) = scenario.validate() {
        warn!("scenario '{}' failed validation ({} problems)", scenario.name, errors.len());
        return Err(ScenarioError::Invalid {
            name: scenario.name,
            errors,
        });
    }

    debug!(
        "loaded scenario '{}': {} models, {} capabilities, {} tasks, {} changeover rules",
        scenario.name,
        scenario.inventory.len(),
        scenario.capabilities.len(),
        scenario.production.len(),
        scenario.changeovers.rules.len()
    );
    Ok(scenario)
}

/// Lists scenario directories (names starting with `scn`) under
/// `data_dir`, sorted. A missing `data_dir` yields an empty list.
pub fn list_scenarios(data_dir: impl AsRef<Path>) -> Result<Vec<String>, ScenarioError> {
    let data_dir = data_dir.as_ref();
    if !data_dir.exists() {
        return Ok(Vec::new());
    }
    let io_err = |source| ScenarioError::Io {
        path: data_dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(data_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(SCENARIO_PREFIX) && entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl Scenario {
    /// Writes the bundle as the four JSON files into `dir`, creating it
    /// if needed.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<(), ScenarioError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| ScenarioError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        write_json(
            &dir.join(INVENTORY_FILE),
            &InventoryFile {
                inventory: self.inventory.clone(),
            },
        )?;
        write_json(
            &dir.join(CAPABILITY_FILE),
            &CapabilityFile {
                capabilities: self.capabilities.clone(),
            },
        )?;
        write_json(
            &dir.join(PLAN_WIP_FILE),
            &PlanWipFile {
                production: self.production.clone(),
            },
        )?;
        write_json(&dir.join(CHANGEOVER_FILE), &self.changeovers)
    }
}

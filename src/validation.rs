//! Input validation for scenario bundles.
//!
//! Checks structural integrity of a scenario before simulation. Detects:
//! - An empty production plan
//! - Duplicate tasks and duplicate inventory models
//! - Two steps of one product sharing an operation sequence
//! - Initial placements exceeding a model's inventory

use crate::scenario::Scenario;
use std::collections::{HashMap, HashSet};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// The production plan has no records.
    EmptyProduction,
    /// A task or inventory model appears twice.
    DuplicateId,
    /// Two steps of one product share an operation sequence.
    DuplicateSequence,
    /// Feasible initial placements of a model exceed its unit count.
    InitialPlacementOverflow,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates a scenario bundle.
///
/// Checks:
/// 1. The production plan is not empty
/// 2. No (product, process) appears twice in the plan
/// 3. No model appears twice in the inventory
/// 4. Operation sequences are unique within each product
/// 5. Initial placements per model fit its inventory
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_scenario(scenario: &Scenario) -> ValidationResult {
    let mut errors = Vec::new();

    if scenario.production.is_empty() {
        errors.push(ValidationError::new(
            ValidationErrorKind::EmptyProduction,
            format!("Scenario '{}' has no production records", scenario.name),
        ));
    }

    let mut models = HashMap::new();
    for item in &scenario.inventory {
        if models.insert(item.model.as_str(), item.count).is_some() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate inventory model: {}", item.model),
            ));
        }
    }

    let mut tasks = HashSet::new();
    let mut sequences = HashSet::new();
    for record in &scenario.production {
        if !tasks.insert((record.product.as_str(), record.process.as_str())) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task: {}", record.task()),
            ));
            continue;
        }
        if !sequences.insert((record.product.as_str(), record.operation_sequence)) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateSequence,
                format!(
                    "Product '{}' has two steps at operation sequence {}",
                    record.product, record.operation_sequence
                ),
            ));
        }
    }

    let mut placed: HashMap<&str, u64> = HashMap::new();
    for cap in scenario.capabilities.iter().filter(|c| c.feasible) {
        *placed.entry(cap.model.as_str()).or_insert(0) += cap.initial_count as u64;
    }
    let mut overflowing: Vec<(&str, u64)> = placed
        .into_iter()
        .filter(|&(model, n)| n > models.get(model).copied().unwrap_or(0) as u64)
        .collect();
    overflowing.sort();
    for (model, n) in overflowing {
        errors.push(ValidationError::new(
            ValidationErrorKind::InitialPlacementOverflow,
            format!(
                "Model '{}' places {} units initially but has {} in inventory",
                model,
                n,
                models.get(model).copied().unwrap_or(0)
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

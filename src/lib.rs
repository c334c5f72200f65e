//! Drum-Buffer-Rope production scheduling and simulation.
//!
//! Simulates a multi-product, multi-process shop floor minute by minute
//! and dispatches idle equipment with a greedy Drum-Buffer-Rope heuristic:
//! the bottleneck task (the drum) is served first, and upstream release
//! is throttled (the rope) while the drum's buffer is full.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `TaskKey`, `Routing`, `ProductionLedger`,
//!   `Equipment`, `CapabilityIndex`, `ChangeoverMatrix`
//! - **`dispatching`**: The `Dispatcher` trait and the DBR scheduler
//! - **`simulation`**: The tick loop, allocation snapshots, run summary
//! - **`scenario`**: Scenario bundles, JSON loading, synthetic generation
//! - **`validation`**: Input integrity checks (duplicate tasks, sequences,
//!   placement overflow)
//!
//! # Example
//!
//! ```
//! use dbr_schedule::dispatching::DbrScheduler;
//! use dbr_schedule::scenario::ScenarioGenerator;
//! use dbr_schedule::simulation::Simulator;
//!
//! let scenario = ScenarioGenerator::new().with_seed(1).generate();
//! let report = Simulator::new(&scenario, DbrScheduler::new()).run().unwrap();
//! println!("{}", report.summary);
//! ```
//!
//! # References
//!
//! - Goldratt & Cox (1984), "The Goal"
//! - Schragenheim & Ronen (1990), "Drum-Buffer-Rope shop floor control"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"

pub mod dispatching;
pub mod models;
pub mod scenario;
pub mod simulation;
pub mod validation;

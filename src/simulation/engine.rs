//! The simulation loop.

use log::{debug, info};
use std::collections::HashMap;

use super::report::{AllocationRow, RunSummary, SimulationReport};
use super::{SimulationConfig, SimulationError};
use crate::dispatching::{commitments_from, Assignment, DispatchContext, Dispatcher};
use crate::models::{
    CapabilityIndex, ChangeoverMatrix, Equipment, EquipmentStatus, ProductionLedger, Routing,
    TaskKey,
};
use crate::scenario::Scenario;

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    /// Tasks whose unit finished this tick, in fleet order.
    pub completions: Vec<TaskKey>,
    /// Assignments applied this tick.
    pub assignments: Vec<Assignment>,
    /// Whether any unit's status differs from the previous tick.
    pub status_changed: bool,
    /// Whether the fleet is quiet and every final step met its plan.
    pub finished: bool,
}

/// Tick-driven factory simulator.
///
/// Owns the ledger and the fleet; the dispatcher only ever sees them
/// through a read-only [`DispatchContext`].
#[derive(Debug)]
pub struct Simulator<D: Dispatcher> {
    config: SimulationConfig,
    dispatcher: D,
    routing: Routing,
    ledger: ProductionLedger,
    capabilities: CapabilityIndex,
    changeovers: ChangeoverMatrix,
    fleet: Vec<Equipment>,
    fleet_index: HashMap<String, usize>,
    previous_status: Vec<EquipmentStatus>,
    allocations: Vec<AllocationRow>,
}

impl<D: Dispatcher> Simulator<D> {
    /// Builds the runtime state of `scenario`.
    pub fn new(scenario: &Scenario, dispatcher: D) -> Self {
        let fleet = scenario.build_fleet();
        let fleet_index = fleet
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        let previous_status = fleet.iter().map(Equipment::status).collect();

        Self {
            config: SimulationConfig::default(),
            dispatcher,
            routing: scenario.routing(),
            ledger: scenario.ledger(),
            capabilities: scenario.capability_index(),
            changeovers: scenario.changeover_matrix(),
            fleet,
            fleet_index,
            previous_status,
            allocations: Vec::new(),
        }
    }

    /// Sets the run parameters.
    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn ledger(&self) -> &ProductionLedger {
        &self.ledger
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }

    pub fn fleet(&self) -> &[Equipment] {
        &self.fleet
    }

    /// Looks up a unit by id.
    pub fn equipment(&self, id: &str) -> Option<&Equipment> {
        self.fleet_index.get(id).map(|&i| &self.fleet[i])
    }

    /// Snapshot rows recorded so far.
    pub fn allocations(&self) -> &[AllocationRow] {
        &self.allocations
    }

    /// Runs ticks `0..=total_minutes`, stopping early once all plans are
    /// met, and returns the report.
    ///
    /// Meant to be called once on a fresh simulator.
    pub fn run(&mut self) -> Result<SimulationReport, SimulationError> {
        info!(
            "simulation started: {} units, {} tasks, horizon {} min, dispatcher {}",
            self.fleet.len(),
            self.ledger.tasks().len(),
            self.config.total_minutes,
            self.dispatcher.name()
        );

        let mut elapsed = 0;
        let mut terminated_early = false;
        for t in 0..=self.config.total_minutes {
            elapsed = t;
            if self.tick(t)?.finished {
                terminated_early = true;
                info!("all final production targets met at {t} minutes");
                break;
            }
        }

        let summary = RunSummary::calculate(
            &self.ledger,
            &self.routing,
            &self.fleet,
            elapsed,
            terminated_early,
        );
        info!(
            "simulation finished at {} min: achievement {:.2}%, utilization {:.2}%, {} changeovers",
            summary.elapsed_minutes,
            summary.average_achievement_percent,
            summary.utilization_percent,
            summary.total_changeovers
        );

        Ok(SimulationReport {
            summary,
            allocations: std::mem::take(&mut self.allocations),
        })
    }

    /// Advances the factory by one minute at time `t`.
    pub fn tick(&mut self, t: u32) -> Result<TickOutcome, SimulationError> {
        let mut outcome = TickOutcome::default();

        for equipment in &mut self.fleet {
            if let Some(task) = equipment.step() {
                self.ledger.record_completion(&task, &self.routing);
                outcome.completions.push(task);
            }
        }

        if self.fleet.iter().any(Equipment::is_idle) {
            let commitments = commitments_from(&self.fleet);
            let idle: Vec<&Equipment> = self.fleet.iter().filter(|e| e.is_idle()).collect();
            let context = DispatchContext::new(
                &self.ledger,
                &self.routing,
                &self.capabilities,
                &self.changeovers,
                &commitments,
            )
            .at_time(t);
            outcome.assignments = self.dispatcher.dispatch(&idle, &context);
        }

        for assignment in &outcome.assignments {
            self.apply(assignment)?;
        }
        if !outcome.assignments.is_empty() {
            debug!("t={t}: {} assignments", outcome.assignments.len());
        }

        outcome.status_changed = self
            .fleet
            .iter()
            .zip(&self.previous_status)
            .any(|(e, &prev)| e.status() != prev);
        outcome.finished =
            !self.fleet.iter().any(Equipment::is_active) && self.ledger.terminal_plans_met(&self.routing);

        if self.config.record_allocations && (t == 0 || outcome.status_changed || outcome.finished) {
            self.allocations.extend(AllocationRow::snapshot(
                t,
                &self.routing,
                &self.ledger,
                &self.capabilities,
                &self.fleet,
            ));
        }

        for (prev, equipment) in self.previous_status.iter_mut().zip(&self.fleet) {
            *prev = equipment.status();
        }
        Ok(outcome)
    }

    fn apply(&mut self, assignment: &Assignment) -> Result<(), SimulationError> {
        let &index = self
            .fleet_index
            .get(&assignment.equipment_id)
            .ok_or_else(|| SimulationError::UnknownEquipment(assignment.equipment_id.clone()))?;

        if self.ledger.wip(&assignment.task) == 0 {
            return Err(SimulationError::NoWip {
                equipment_id: assignment.equipment_id.clone(),
                task: assignment.task.clone(),
            });
        }

        let duration = self.capabilities.service_time_or_default(&assignment.task);
        self.fleet[index].start_work(
            assignment.task.clone(),
            duration,
            assignment.changeover_minutes,
        )?;
        self.ledger.take_wip(&assignment.task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::{DbrPolicy, DbrScheduler};
    use crate::models::{Capability, EquipmentError, FirstPlacement};
    use crate::scenario::{ProductionRecord, ScenarioGenerator};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn task(p: &str, s: &str) -> TaskKey {
        TaskKey::new(p, s)
    }

    fn single_task(units: u32, wip: u32, plan: u32) -> Scenario {
        Scenario::new("scn_single")
            .with_inventory("CNC", units)
            .with_capability(Capability::new("CNC", "A", "cut", 10).with_initial_count(1))
            .with_production(ProductionRecord::new("A", "cut", 1, wip, plan))
            .with_default_changeover(5)
    }

    #[test]
    fn test_single_task_runs_to_plan() {
        init_logger();
        let mut sim = Simulator::new(&single_task(1, 50, 50), DbrScheduler::new());
        let report = sim.run().unwrap();

        assert_eq!(sim.ledger().achieved(&task("A", "cut")), 50);
        assert_eq!(sim.ledger().wip(&task("A", "cut")), 0);
        assert!(report.summary.terminated_early);
        assert_eq!(report.summary.elapsed_minutes, 500);
        assert!((report.summary.utilization_percent - 100.0).abs() < 1e-10);
        assert!((report.summary.average_achievement_percent - 100.0).abs() < 1e-10);
        assert_eq!(report.summary.total_changeovers, 0);
        assert!(report.summary.all_plans_met());
    }

    #[test]
    fn test_horizon_cuts_run_short() {
        let config = SimulationConfig::default().with_total_minutes(95);
        let mut sim = Simulator::new(&single_task(1, 50, 50), DbrScheduler::new()).with_config(config);
        let report = sim.run().unwrap();

        assert!(!report.summary.terminated_early);
        assert_eq!(report.summary.elapsed_minutes, 95);
        assert_eq!(report.summary.products[0].achieved, 9);
        assert!((report.summary.products[0].rate_percent - 18.0).abs() < 1e-10);
    }

    #[test]
    fn test_single_wip_starts_one_unit() {
        let mut sim = Simulator::new(&single_task(2, 1, 10), DbrScheduler::new());
        let outcome = sim.tick(0).unwrap();

        assert_eq!(outcome.assignments.len(), 1);
        let working = sim
            .fleet()
            .iter()
            .filter(|e| e.status() == EquipmentStatus::Working)
            .count();
        assert_eq!(working, 1);
        assert_eq!(sim.ledger().wip(&task("A", "cut")), 0);
        assert!(outcome.status_changed);
        assert!(!outcome.finished);
    }

    /// A: cut(1) → weld(2). weld is the drum and starts with WIP 6.
    fn rope_scenario() -> Scenario {
        Scenario::new("scn_rope")
            .with_inventory("SAW", 1)
            .with_inventory("WELDER", 1)
            .with_capability(Capability::new("SAW", "A", "cut", 5).with_initial_count(1))
            .with_capability(Capability::new("WELDER", "A", "weld", 30).with_initial_count(1))
            .with_production(ProductionRecord::new("A", "cut", 1, 10, 10))
            .with_production(ProductionRecord::new("A", "weld", 2, 6, 10))
            .with_default_changeover(10)
    }

    #[test]
    fn test_rope_holds_upstream_until_buffer_drains() {
        init_logger();
        let mut sim = Simulator::new(&rope_scenario(), DbrScheduler::new());

        // Drum WIP stays at 5 or more until the welder takes its second unit at t=30.
        for t in 0..=30 {
            sim.tick(t).unwrap();
            assert!(sim.equipment("SAW_1").unwrap().is_idle(), "saw released at t={t}");
        }
        assert_eq!(sim.ledger().wip(&task("A", "weld")), 4);

        sim.tick(31).unwrap();
        let saw = sim.equipment("SAW_1").unwrap();
        assert_eq!(saw.status(), EquipmentStatus::Working);
        assert_eq!(sim.ledger().wip(&task("A", "cut")), 9);
    }

    #[test]
    fn test_changeover_lands_on_dispatched_task() {
        let scenario = Scenario::new("scn_move")
            .with_inventory("CNC", 1)
            .with_capability(Capability::new("CNC", "A", "cut", 10).with_initial_count(1))
            .with_capability(Capability::new("CNC", "B", "paint", 7))
            .with_production(ProductionRecord::new("A", "cut", 1, 0, 0))
            .with_production(ProductionRecord::new("B", "paint", 1, 3, 3))
            .with_default_changeover(4);
        let mut sim = Simulator::new(&scenario, DbrScheduler::new());

        let outcome = sim.tick(0).unwrap();
        assert_eq!(outcome.assignments, vec![Assignment::new("CNC_1", task("B", "paint"), 4)]);
        for t in 1..=3 {
            sim.tick(t).unwrap();
            let unit = sim.equipment("CNC_1").unwrap();
            assert_eq!(unit.status(), EquipmentStatus::Changeover);
            assert_eq!(unit.current(), Some(&task("A", "cut")));
        }

        sim.tick(4).unwrap();
        let unit = sim.equipment("CNC_1").unwrap();
        assert_eq!(unit.status(), EquipmentStatus::Working);
        assert_eq!(unit.current(), Some(&task("B", "paint")));
        assert_eq!(unit.remaining_minutes(), 7);
        assert_eq!(unit.changeover_count(), 1);
    }

    #[test]
    fn test_first_placement_policies() {
        let scenario = Scenario::new("scn_first")
            .with_inventory("CNC", 1)
            .with_capability(Capability::new("CNC", "A", "cut", 10))
            .with_production(ProductionRecord::new("A", "cut", 1, 2, 2))
            .with_default_changeover(5);

        let free = Simulator::new(&scenario, DbrScheduler::new())
            .run()
            .unwrap()
            .summary;
        assert_eq!(free.elapsed_minutes, 20);
        assert_eq!(free.total_changeovers, 0);

        let policy = DbrPolicy::default().with_first_placement(FirstPlacement::DefaultTime);
        let charged = Simulator::new(&scenario, DbrScheduler::new().with_policy(policy))
            .run()
            .unwrap()
            .summary;
        assert_eq!(charged.elapsed_minutes, 25);
        assert_eq!(charged.total_changeovers, 1);
        assert!(charged.all_plans_met());
    }

    #[test]
    fn test_ledger_invariants_hold_every_tick() {
        init_logger();
        let scenario = ScenarioGenerator::new()
            .with_products(3)
            .with_processes(4)
            .with_seed(11)
            .generate();
        let mut sim = Simulator::new(&scenario, DbrScheduler::new());
        let tasks: Vec<TaskKey> = sim.ledger().tasks().to_vec();
        let units_in_system: HashMap<String, u64> = scenario
            .products()
            .into_iter()
            .map(|p| {
                let total: u64 = tasks
                    .iter()
                    .filter(|t| t.product == p)
                    .map(|t| sim.ledger().wip(t) as u64)
                    .sum();
                (p, total)
            })
            .collect();
        let mut achieved: Vec<u32> = tasks.iter().map(|t| sim.ledger().achieved(t)).collect();

        for t in 0..=1440 {
            let outcome = sim.tick(t).unwrap();
            for (i, task) in tasks.iter().enumerate() {
                let now = sim.ledger().achieved(task);
                assert!(now >= achieved[i], "achieved dropped for {task} at t={t}");
                assert!(now <= sim.ledger().plan(task));
                achieved[i] = now;
            }
            for unit in sim.fleet() {
                match unit.status() {
                    EquipmentStatus::Idle => assert!(unit.target().is_none()),
                    EquipmentStatus::Working => assert!(unit.current().is_some()),
                    EquipmentStatus::Changeover => assert!(unit.target().is_some()),
                }
            }
            // Units are conserved: queued + in progress + shipped.
            for (product, &total) in &units_in_system {
                let queued: u64 = tasks
                    .iter()
                    .filter(|k| &k.product == product)
                    .map(|k| sim.ledger().wip(k) as u64)
                    .sum();
                let in_progress = sim
                    .fleet()
                    .iter()
                    .filter_map(|e| e.committed_task())
                    .filter(|k| &k.product == product)
                    .count() as u64;
                let shipped = sim
                    .routing()
                    .terminal(product)
                    .map_or(0, |last| sim.ledger().achieved(last) as u64);
                assert_eq!(queued + in_progress + shipped, total, "{product} at t={t}");
            }
            if outcome.finished {
                break;
            }
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let scenario = ScenarioGenerator::new().with_products(4).with_seed(3).generate();
        let first = Simulator::new(&scenario, DbrScheduler::new()).run().unwrap();
        let second = Simulator::new(&scenario, DbrScheduler::new()).run().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_both_resident_presets_complete() {
        let scenario = Scenario::new("scn_two_lines")
            .with_inventory("SAW", 2)
            .with_inventory("PACKER", 2)
            .with_capability(Capability::new("SAW", "A", "cut", 6).with_initial_count(1))
            .with_capability(Capability::new("SAW", "B", "cut", 4).with_initial_count(1))
            .with_capability(Capability::new("PACKER", "A", "pack", 9).with_initial_count(1))
            .with_capability(Capability::new("PACKER", "B", "pack", 12))
            .with_production(ProductionRecord::new("A", "cut", 10, 8, 8))
            .with_production(ProductionRecord::new("A", "pack", 20, 0, 8))
            .with_production(ProductionRecord::new("B", "cut", 10, 6, 6))
            .with_production(ProductionRecord::new("B", "pack", 20, 0, 6))
            .with_default_changeover(5);

        for policy in [DbrPolicy::potential_gated(), DbrPolicy::ungated()] {
            let mut sim = Simulator::new(&scenario, DbrScheduler::new().with_policy(policy.clone()));
            let report = sim.run().unwrap();
            assert_eq!(sim.dispatcher().drum().unwrap().drum(), &task("A", "pack"));
            assert!(
                report.summary.all_plans_met(),
                "{:?} left plans unmet: {}",
                policy.resident,
                report.summary
            );
            assert!(report.summary.terminated_early);
            assert!(report.summary.utilization_percent > 0.0);
            assert!(report.summary.utilization_percent <= 100.0);
        }
    }

    #[test]
    fn test_snapshots_on_status_change_only() {
        let mut sim = Simulator::new(&single_task(1, 2, 2), DbrScheduler::new());
        let report = sim.run().unwrap();

        let times: Vec<u32> = report.allocations.iter().map(|r| r.time_minutes).collect();
        // t=0 start; t=10 completes and restarts (Working → Working, no
        // change); t=20 finishes.
        assert_eq!(times, vec![0, 20]);
        let first = report.allocations_at(0).next().unwrap();
        assert_eq!(first.allocated, 1);
        assert_eq!(first.wip, 1);
        assert!((first.capacity - 1.0).abs() < 1e-10);
        let last = report.allocations_at(20).next().unwrap();
        assert_eq!(last.achieved, 2);

        let quiet = Simulator::new(&single_task(1, 2, 2), DbrScheduler::new())
            .with_config(SimulationConfig::default().with_record_allocations(false))
            .run()
            .unwrap();
        assert!(quiet.allocations.is_empty());
        assert_eq!(quiet.summary, report.summary);
    }

    #[test]
    fn test_boxed_dispatcher() {
        let dispatcher: Box<dyn Dispatcher> = Box::new(DbrScheduler::new());
        let mut sim = Simulator::new(&single_task(1, 3, 3), dispatcher);
        let report = sim.run().unwrap();
        assert_eq!(sim.dispatcher().name(), "DBR");
        assert_eq!(report.summary.elapsed_minutes, 30);
    }

    /// Replays a fixed list of assignments on the first call.
    #[derive(Debug)]
    struct Scripted(Vec<Assignment>);

    impl Dispatcher for Scripted {
        fn name(&self) -> &'static str {
            "SCRIPTED"
        }

        fn dispatch(&mut self, _idle: &[&Equipment], _context: &DispatchContext<'_>) -> Vec<Assignment> {
            std::mem::take(&mut self.0)
        }
    }

    #[test]
    fn test_bad_assignments_surface_as_errors() {
        let scenario = single_task(1, 1, 1);

        let mut sim = Simulator::new(&scenario, Scripted(vec![Assignment::new("NOPE_1", task("A", "cut"), 0)]));
        assert_eq!(
            sim.tick(0).unwrap_err(),
            SimulationError::UnknownEquipment("NOPE_1".into())
        );

        let mut sim = Simulator::new(&scenario, Scripted(vec![Assignment::new("CNC_1", task("A", "pack"), 0)]));
        assert!(matches!(sim.tick(0).unwrap_err(), SimulationError::NoWip { .. }));

        let twice = vec![
            Assignment::new("CNC_1", task("A", "cut"), 0),
            Assignment::new("CNC_1", task("A", "cut"), 0),
        ];
        let scenario = single_task(1, 2, 2);
        let mut sim = Simulator::new(&scenario, Scripted(twice));
        assert!(matches!(
            sim.tick(0).unwrap_err(),
            SimulationError::Equipment(EquipmentError::Busy { .. })
        ));
    }
}

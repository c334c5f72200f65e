//! Drum-Buffer-Rope greedy dispatcher.
//!
//! # Algorithm
//!
//! Once per tick, for each idle unit (unpositioned units first, then by
//! current product and process):
//!
//! 1. Scan tasks drum first, downstream next, upstream last.
//! 2. Skip tasks the unit cannot run, tasks whose plan is already covered
//!    by achieved plus committed units, and (rope) tasks feeding the drum
//!    while the drum's WIP is at or above the buffer size.
//! 3. Score the rest; keep the first strictly best.
//! 4. If the winner has queued WIP, take one unit provisionally and emit
//!    an assignment. Otherwise the unit stays put and waits.
//!
//! Score = flow + resident bonus − move penalty − balance penalty, where
//! flow rewards queued WIP (or, for a resident unit, work heading to the
//! station) and the balance penalty discourages piling several units onto
//! one station in the same tick.
//!
//! # Complexity
//! O(e · t) per tick where e = idle units, t = tasks, plus O(t²) once for
//! station potentials.
//!
//! # Reference
//! Schragenheim & Ronen (1990), "Drum-Buffer-Rope shop floor control"

use log::{debug, trace, warn};
use std::collections::HashMap;

use super::{Assignment, DbrPolicy, DispatchContext, Dispatcher, DrumAnalysis};
use crate::models::{Equipment, TaskKey};

/// Components of a candidate score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub flow: f64,
    pub resident_bonus: f64,
    pub move_penalty: f64,
    pub balance_penalty: f64,
}

impl ScoreBreakdown {
    /// Combined score (higher is better).
    pub fn total(&self) -> f64 {
        self.flow + self.resident_bonus - self.move_penalty - self.balance_penalty
    }
}

/// Drum-Buffer-Rope dispatcher.
///
/// The drum is identified from the first context this instance sees and
/// cached for the rest of its life; use a fresh instance per scenario.
///
/// # Example
///
/// ```
/// use dbr_schedule::dispatching::{commitments_from, DbrScheduler, DispatchContext, Dispatcher};
/// use dbr_schedule::models::{
///     Capability, CapabilityIndex, ChangeoverMatrix, Equipment, ProductionLedger, Routing, TaskKey,
/// };
///
/// let cut = TaskKey::new("A", "cut");
/// let ledger = ProductionLedger::new().with_task(cut.clone(), 10, 1);
/// let routing = Routing::from_steps([(&cut, 1)]);
/// let caps = CapabilityIndex::from_capabilities(&[Capability::new("CNC", "A", "cut", 5)]);
/// let changeovers = ChangeoverMatrix::new(30);
/// let fleet = vec![Equipment::new("CNC_1", "CNC"), Equipment::new("CNC_2", "CNC")];
/// let commitments = commitments_from(&fleet);
///
/// let ctx = DispatchContext::new(&ledger, &routing, &caps, &changeovers, &commitments);
/// let idle: Vec<&Equipment> = fleet.iter().collect();
/// let assignments = DbrScheduler::new().dispatch(&idle, &ctx);
///
/// // One unit of WIP: only one machine is started.
/// assert_eq!(assignments.len(), 1);
/// assert_eq!(assignments[0].equipment_id, "CNC_1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DbrScheduler {
    policy: DbrPolicy,
    drum: Option<DrumAnalysis>,
}

impl DbrScheduler {
    /// Creates a scheduler with the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the policy.
    pub fn with_policy(mut self, policy: DbrPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active policy.
    pub fn policy(&self) -> &DbrPolicy {
        &self.policy
    }

    /// Cached drum, once identified.
    pub fn drum(&self) -> Option<&DrumAnalysis> {
        self.drum.as_ref()
    }

    /// Station potential per task: queued WIP, plus units committed to
    /// earlier steps of the same product, plus WIP queued at those steps.
    pub fn station_potentials(context: &DispatchContext<'_>) -> HashMap<TaskKey, u32> {
        let ledger = context.ledger;
        ledger
            .tasks()
            .iter()
            .map(|task| {
                let upstream: u32 = context
                    .routing
                    .upstream_of(task)
                    .map(|up| context.committed(up) + ledger.wip(up))
                    .sum();
                (task.clone(), ledger.wip(task) + upstream)
            })
            .collect()
    }

    /// Scores one (unit, task) candidate.
    ///
    /// `wip` and `committed` are the provisional values for this tick.
    pub fn score(
        &self,
        equipment: &Equipment,
        task: &TaskKey,
        wip: u32,
        potential: u32,
        committed: u32,
        changeover_minutes: u32,
    ) -> ScoreBreakdown {
        let policy = &self.policy;
        let resident = equipment.is_resident_at(task);

        let flow = if wip > 0 {
            policy.wip_base + policy.wip_weight * wip as f64
        } else if resident {
            policy.resident.flow_score(potential).unwrap_or(0.0)
        } else {
            0.0
        };

        ScoreBreakdown {
            flow,
            resident_bonus: if resident { policy.resident_bonus } else { 0.0 },
            move_penalty: if resident {
                0.0
            } else {
                policy.move_penalty_per_minute * changeover_minutes as f64
            },
            balance_penalty: policy.balance_penalty * committed as f64,
        }
    }

    /// Idle units in processing order: unpositioned first, then by
    /// current (product, process). Stable for equal keys.
    fn processing_order<'e>(idle: &[&'e Equipment]) -> Vec<&'e Equipment> {
        let mut ordered = idle.to_vec();
        ordered.sort_by(|a, b| {
            a.current()
                .is_some()
                .cmp(&b.current().is_some())
                .then_with(|| a.current().cmp(&b.current()))
        });
        ordered
    }
}

impl Dispatcher for DbrScheduler {
    fn name(&self) -> &'static str {
        "DBR"
    }

    fn dispatch(&mut self, idle: &[&Equipment], context: &DispatchContext<'_>) -> Vec<Assignment> {
        if self.drum.is_none() {
            self.drum = DrumAnalysis::identify(context.ledger, context.capabilities);
            if self.drum.is_none() {
                warn!("no drum could be identified; nothing to dispatch");
            }
        }
        let Some(drum) = self.drum.as_ref() else {
            return Vec::new();
        };

        let ledger = context.ledger;
        let tasks = drum.dispatch_order(ledger.tasks(), context.routing);
        let potentials = Self::station_potentials(context);

        let mut wip: HashMap<TaskKey, u32> = ledger.wip_map().clone();
        let mut committed: HashMap<TaskKey, u32> = context.commitments.clone();
        let mut assignments = Vec::new();

        for equipment in Self::processing_order(idle) {
            let mut best: Option<&TaskKey> = None;
            let mut best_score = f64::MIN;

            for &task in &tasks {
                if !context.capabilities.is_capable(&equipment.model, task) {
                    continue;
                }
                let task_committed = committed.get(task).copied().unwrap_or(0);
                if ledger.achieved(task) + task_committed >= ledger.plan(task) {
                    continue;
                }
                // Rope
                if drum.feeds_drum(task, context.routing)
                    && wip.get(drum.drum()).copied().unwrap_or(0) >= self.policy.buffer_size
                {
                    continue;
                }

                let changeover =
                    context
                        .changeovers
                        .cost(equipment, task, self.policy.first_placement);
                let score = self
                    .score(
                        equipment,
                        task,
                        wip.get(task).copied().unwrap_or(0),
                        potentials.get(task).copied().unwrap_or(0),
                        task_committed,
                        changeover,
                    )
                    .total();

                if score > best_score {
                    best_score = score;
                    best = Some(task);
                }
            }

            let Some(task) = best else {
                trace!("{} has no eligible task", equipment.id);
                continue;
            };

            match wip.get_mut(task) {
                Some(queued) if *queued > 0 => {
                    *queued -= 1;
                    *committed.entry(task.clone()).or_insert(0) += 1;
                    let changeover =
                        context
                            .changeovers
                            .cost(equipment, task, self.policy.first_placement);
                    debug!(
                        "t={} assign {} -> {} (changeover {} min, score {})",
                        context.time_minutes, equipment.id, task, changeover, best_score
                    );
                    assignments.push(Assignment::new(&equipment.id, task.clone(), changeover));
                }
                _ => trace!("{} waits resident at {}", equipment.id, task),
            }
        }

        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::{commitments_from, Commitments, ResidentScoring};
    use crate::models::{
        Capability, CapabilityIndex, ChangeoverMatrix, FirstPlacement, ProductionLedger, Routing,
    };

    struct Fixture {
        ledger: ProductionLedger,
        routing: Routing,
        caps: CapabilityIndex,
        changeovers: ChangeoverMatrix,
    }

    impl Fixture {
        fn context<'a>(&'a self, commitments: &'a Commitments) -> DispatchContext<'a> {
            DispatchContext::new(
                &self.ledger,
                &self.routing,
                &self.caps,
                &self.changeovers,
                commitments,
            )
        }
    }

    fn task(p: &str, s: &str) -> TaskKey {
        TaskKey::new(p, s)
    }

    /// A: cut(1) → weld(2) → pack(3). weld is the drum (slowest).
    fn three_step(cut_wip: u32, weld_wip: u32, pack_wip: u32) -> Fixture {
        let (cut, weld, pack) = (task("A", "cut"), task("A", "weld"), task("A", "pack"));
        Fixture {
            ledger: ProductionLedger::new()
                .with_task(cut.clone(), 20, cut_wip)
                .with_task(weld.clone(), 20, weld_wip)
                .with_task(pack.clone(), 20, pack_wip),
            routing: Routing::from_steps([(&cut, 1), (&weld, 2), (&pack, 3)]),
            caps: CapabilityIndex::from_capabilities(&[
                Capability::new("M", "A", "cut", 5),
                Capability::new("M", "A", "weld", 20),
                Capability::new("M", "A", "pack", 5),
            ]),
            changeovers: ChangeoverMatrix::new(10),
        }
    }

    #[test]
    fn test_single_wip_assigns_one_unit() {
        let fx = Fixture {
            ledger: ProductionLedger::new().with_task(task("A", "cut"), 10, 1),
            routing: Routing::from_steps([(&task("A", "cut"), 1)]),
            caps: CapabilityIndex::from_capabilities(&[Capability::new("M", "A", "cut", 10)]),
            changeovers: ChangeoverMatrix::new(0),
        };
        let fleet = vec![Equipment::new("M_1", "M"), Equipment::new("M_2", "M")];
        let commitments = commitments_from(&fleet);
        let idle: Vec<&Equipment> = fleet.iter().collect();

        let out = DbrScheduler::new().dispatch(&idle, &fx.context(&commitments));
        assert_eq!(out, vec![Assignment::new("M_1", task("A", "cut"), 0)]);
    }

    #[test]
    fn test_drum_cached_after_first_dispatch() {
        let fx = three_step(1, 0, 0);
        let commitments = Commitments::new();
        let mut s = DbrScheduler::new();
        assert!(s.drum().is_none());
        s.dispatch(&[], &fx.context(&commitments));
        assert_eq!(s.drum().map(|d| d.drum()), Some(&task("A", "weld")));
    }

    #[test]
    fn test_rope_blocks_upstream_when_buffer_full() {
        let fx = three_step(10, 5, 0);
        // Unit resident at cut (upstream of the drum) cannot run weld.
        let caps = CapabilityIndex::from_capabilities(&[Capability::new("M", "A", "cut", 5)]);
        let fx = Fixture { caps, ..fx };
        let fleet = vec![Equipment::new("M_1", "M").with_position(task("A", "cut"))];
        let commitments = commitments_from(&fleet);
        let idle: Vec<&Equipment> = fleet.iter().collect();

        let mut s = DbrScheduler::new().with_policy(DbrPolicy::default().with_buffer_size(5));
        s.drum = Some(DrumAnalysis::with_drum(task("A", "weld")));
        assert!(s.dispatch(&idle, &fx.context(&commitments)).is_empty());

        // Below the buffer the rope releases work again.
        let fx = Fixture { caps: fx.caps, ..three_step(10, 4, 0) };
        let out = s.dispatch(&idle, &fx.context(&commitments));
        assert_eq!(out, vec![Assignment::new("M_1", task("A", "cut"), 0)]);
    }

    #[test]
    fn test_drum_preferred_over_upstream() {
        let fx = three_step(3, 3, 0);
        let fleet = vec![Equipment::new("M_1", "M")];
        let commitments = commitments_from(&fleet);
        let idle: Vec<&Equipment> = fleet.iter().collect();

        // Equal WIP and no changeover: the drum is scanned first and wins ties.
        let out = DbrScheduler::new().dispatch(&idle, &fx.context(&commitments));
        assert_eq!(out[0].task, task("A", "weld"));
    }

    #[test]
    fn test_plan_covered_task_is_skipped() {
        let mut fx = three_step(0, 0, 5);
        fx.ledger.register(task("A", "pack"), 2, 5);
        let mut busy = Equipment::new("M_9", "M");
        busy.start_work(task("A", "pack"), 5, 0).unwrap();
        let mut busy2 = Equipment::new("M_8", "M");
        busy2.start_work(task("A", "pack"), 5, 0).unwrap();

        // Two units already committed to pack, plan is 2 → covered.
        let commitments = commitments_from([&busy, &busy2]);
        let idle_unit = Equipment::new("M_1", "M");
        let out = DbrScheduler::new().dispatch(&[&idle_unit], &fx.context(&commitments));
        assert!(out.is_empty());
    }

    #[test]
    fn test_resident_waits_when_potential_gated() {
        // Unit at pack, no pack WIP, but cut WIP is heading down the line.
        let fx = Fixture {
            changeovers: ChangeoverMatrix::new(60),
            ..three_step(4, 0, 0)
        };
        let fleet = vec![Equipment::new("M_1", "M").with_position(task("A", "pack"))];
        let commitments = commitments_from(&fleet);
        let idle: Vec<&Equipment> = fleet.iter().collect();

        // cut: 1000 + 40 - 900 = 140; pack: 800 + 5*4 + 200 = 1020 → stay.
        let out = DbrScheduler::new().dispatch(&idle, &fx.context(&commitments));
        assert!(out.is_empty());
    }

    #[test]
    fn test_ungated_resident_scores_without_potential() {
        let s_gated = DbrScheduler::new();
        let s_ungated = DbrScheduler::new().with_policy(DbrPolicy::ungated());
        let unit = Equipment::new("M_1", "M").with_position(task("A", "pack"));

        let gated = s_gated.score(&unit, &task("A", "pack"), 0, 0, 0, 0);
        assert!((gated.flow - 0.0).abs() < 1e-10);
        assert!((gated.total() - 200.0).abs() < 1e-10);

        let ungated = s_ungated.score(&unit, &task("A", "pack"), 0, 0, 0, 0);
        assert!((ungated.flow - 500.0).abs() < 1e-10);
        assert!((ungated.total() - 700.0).abs() < 1e-10);
    }

    #[test]
    fn test_score_components() {
        let s = DbrScheduler::new();
        let unit = Equipment::new("M_1", "M").with_position(task("A", "cut"));

        let away = s.score(&unit, &task("A", "weld"), 3, 3, 1, 10);
        assert!((away.flow - 1030.0).abs() < 1e-10);
        assert!((away.resident_bonus - 0.0).abs() < 1e-10);
        assert!((away.move_penalty - 150.0).abs() < 1e-10);
        assert!((away.balance_penalty - 500.0).abs() < 1e-10);
        assert!((away.total() - 380.0).abs() < 1e-10);

        let home = s.score(&unit, &task("A", "cut"), 2, 2, 0, 0);
        assert!((home.total() - 1220.0).abs() < 1e-10);
    }

    #[test]
    fn test_first_placement_changeover_in_assignment() {
        let fx = three_step(0, 2, 0);
        let fleet = vec![Equipment::new("M_1", "M")];
        let commitments = commitments_from(&fleet);
        let idle: Vec<&Equipment> = fleet.iter().collect();

        let free = DbrScheduler::new().dispatch(&idle, &fx.context(&commitments));
        assert_eq!(free[0].changeover_minutes, 0);

        let charged = DbrScheduler::new()
            .with_policy(DbrPolicy::default().with_first_placement(FirstPlacement::DefaultTime))
            .dispatch(&idle, &fx.context(&commitments));
        assert_eq!(charged[0].changeover_minutes, 10);
    }

    #[test]
    fn test_unpositioned_units_processed_first() {
        let fx = three_step(0, 1, 0);
        let positioned = Equipment::new("M_1", "M").with_position(task("A", "cut"));
        let fresh = Equipment::new("M_2", "M");
        let commitments = commitments_from([&positioned, &fresh]);

        let out = DbrScheduler::new().dispatch(&[&positioned, &fresh], &fx.context(&commitments));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].equipment_id, "M_2");
    }

    #[test]
    fn test_incapable_model_never_assigned() {
        let fx = three_step(5, 5, 5);
        let other = Equipment::new("X_1", "X");
        let commitments = Commitments::new();
        let out = DbrScheduler::new().dispatch(&[&other], &fx.context(&commitments));
        assert!(out.is_empty());
    }

    #[test]
    fn test_resident_scoring_presets_differ() {
        assert_ne!(
            DbrPolicy::potential_gated().resident,
            DbrPolicy::ungated().resident
        );
        assert_eq!(DbrPolicy::ungated().resident, ResidentScoring::ungated());
    }
}

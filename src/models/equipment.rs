//! Equipment state machine.
//!
//! Each physical unit moves between three states on a one-minute clock:
//!
//! ```text
//!            start_work(co = 0)
//!   IDLE ───────────────────────────► WORKING ──(remaining = 0)──► IDLE
//!     │                                  ▲          returns the finished task
//!     │ start_work(co > 0)               │
//!     └──────► CHANGEOVER ──(remaining = 0)┘
//! ```
//!
//! A changeover keeps the unit at its old position until the move
//! completes; only then does `current` become the dispatched task and the
//! full service time start counting down.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::TaskKey;

/// Status of an equipment unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentStatus {
    /// Waiting for an assignment.
    Idle,
    /// Processing one unit of its current task.
    Working,
    /// Moving to a new task.
    Changeover,
}

/// Errors raised by equipment transitions.
#[derive(Debug, Error, PartialEq)]
pub enum EquipmentError {
    #[error("equipment {id} cannot start {task}: status is {status:?}")]
    Busy {
        id: String,
        task: TaskKey,
        status: EquipmentStatus,
    },
}

/// One equipment unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equipment {
    /// Unique identifier (`"{model}_{n}"` for loaded fleets).
    pub id: String,
    /// Equipment model, the key into the capability index.
    pub model: String,
    current: Option<TaskKey>,
    status: EquipmentStatus,
    remaining_minutes: u32,
    target: Option<TaskKey>,
    pending_work_minutes: u32,
    total_working_minutes: u64,
    changeover_count: u32,
}

impl Equipment {
    /// Creates an idle, unpositioned unit.
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            current: None,
            status: EquipmentStatus::Idle,
            remaining_minutes: 0,
            target: None,
            pending_work_minutes: 0,
            total_working_minutes: 0,
            changeover_count: 0,
        }
    }

    /// Positions the unit at a task before the run starts.
    pub fn with_position(mut self, task: TaskKey) -> Self {
        self.current = Some(task);
        self
    }

    /// Starts processing one unit of `task`.
    ///
    /// With `changeover_minutes > 0` the unit first moves; the work of
    /// `duration_minutes` starts once the move completes.
    pub fn start_work(
        &mut self,
        task: TaskKey,
        duration_minutes: u32,
        changeover_minutes: u32,
    ) -> Result<(), EquipmentError> {
        if self.status != EquipmentStatus::Idle {
            return Err(EquipmentError::Busy {
                id: self.id.clone(),
                task,
                status: self.status,
            });
        }

        if changeover_minutes > 0 {
            self.status = EquipmentStatus::Changeover;
            self.remaining_minutes = changeover_minutes;
            self.target = Some(task);
            self.pending_work_minutes = duration_minutes;
            self.changeover_count += 1;
        } else {
            self.status = EquipmentStatus::Working;
            self.current = Some(task);
            self.remaining_minutes = duration_minutes;
        }
        Ok(())
    }

    /// Advances the unit by one minute.
    ///
    /// Returns the task whose unit just finished, if any.
    pub fn step(&mut self) -> Option<TaskKey> {
        if self.status == EquipmentStatus::Idle {
            return None;
        }

        self.remaining_minutes = self.remaining_minutes.saturating_sub(1);
        if self.status == EquipmentStatus::Working {
            self.total_working_minutes += 1;
        }
        if self.remaining_minutes > 0 {
            return None;
        }

        match self.status {
            EquipmentStatus::Changeover => {
                self.status = EquipmentStatus::Working;
                self.current = self.target.take();
                self.remaining_minutes = self.pending_work_minutes;
                self.pending_work_minutes = 0;
                None
            }
            EquipmentStatus::Working => {
                self.status = EquipmentStatus::Idle;
                self.current.clone()
            }
            EquipmentStatus::Idle => None,
        }
    }

    /// Current status.
    #[inline]
    pub fn status(&self) -> EquipmentStatus {
        self.status
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.status == EquipmentStatus::Idle
    }

    /// Whether the unit is working or changing over.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status != EquipmentStatus::Idle
    }

    /// Task the unit is positioned at (`None` if never positioned).
    pub fn current(&self) -> Option<&TaskKey> {
        self.current.as_ref()
    }

    /// Destination of an ongoing changeover.
    pub fn target(&self) -> Option<&TaskKey> {
        self.target.as_ref()
    }

    /// Task this unit is committed to: the running task when working,
    /// the destination when changing over, nothing when idle.
    pub fn committed_task(&self) -> Option<&TaskKey> {
        match self.status {
            EquipmentStatus::Working => self.current.as_ref(),
            EquipmentStatus::Changeover => self.target.as_ref(),
            EquipmentStatus::Idle => None,
        }
    }

    /// Whether the unit sits at `task` without needing a move.
    pub fn is_resident_at(&self, task: &TaskKey) -> bool {
        self.current.as_ref() == Some(task)
    }

    /// Minutes left in the current state.
    pub fn remaining_minutes(&self) -> u32 {
        self.remaining_minutes
    }

    /// Minutes spent in WORKING over the whole run.
    pub fn total_working_minutes(&self) -> u64 {
        self.total_working_minutes
    }

    /// Number of changeovers started.
    pub fn changeover_count(&self) -> u32 {
        self.changeover_count
    }
}

//! Trial records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::space::ParamMap;

pub type TrialId = Uuid;
pub type StudyId = Uuid;
pub type BracketId = u32;

/// Lifecycle state for a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialStatus {
    Pending,
    Running,
    Succeeded,
    Pruned,
    Failed,
}

impl TrialStatus {
    /// Terminal statuses are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Pruned | Self::Failed)
    }
}

/// One (rung_index, intermediate_score) observation reported by a trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub rung_index: u32,
    pub score: f64,
}

/// A single trial: one parameter assignment evaluated by the objective.
///
/// Immutable once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub id: TrialId,
    pub study_id: StudyId,
    pub trial_index: usize,
    pub parameters: ParamMap,
    pub status: TrialStatus,
    pub final_score: Option<f64>,
    pub observations: Vec<Observation>,
    pub bracket_id: Option<BracketId>,
    pub failure_kind: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Trial {
    pub fn new_pending(study_id: StudyId, trial_index: usize, parameters: ParamMap) -> Self {
        Self {
            id: Uuid::new_v4(),
            study_id,
            trial_index,
            parameters,
            status: TrialStatus::Pending,
            final_score: None,
            observations: Vec::new(),
            bracket_id: None,
            failure_kind: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.status = TrialStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Write-once per (trial, rung) — caller (the Store) enforces the uniqueness
    /// invariant; this just appends in call order.
    pub fn push_observation(&mut self, rung_index: u32, score: f64) {
        self.observations.push(Observation { rung_index, score });
    }

    pub fn mark_succeeded(&mut self, score: f64) {
        self.status = TrialStatus::Succeeded;
        self.final_score = Some(score);
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_pruned(&mut self) {
        self.status = TrialStatus::Pruned;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, kind: impl Into<String>) {
        self.status = TrialStatus::Failed;
        self.failure_kind = Some(kind.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn latest_observation(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

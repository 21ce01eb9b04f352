//! Read-only status projections consumed by external observers such as a
//! dashboard.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::space::ParamMap;
use crate::study::StudyState;
use crate::trial::{BracketId, StudyId, TrialId, TrialStatus};

/// Snapshot of the best trial observed so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestTrial {
    pub trial_id: TrialId,
    pub parameters: ParamMap,
    pub score: f64,
}

/// Population size at a given rung of a given bracket, for the dashboard's
/// rung-population display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RungPopulation {
    pub bracket_id: BracketId,
    pub rung_index: u32,
    pub population: usize,
}

/// A read-only projection of a study's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyStatusView {
    pub study_id: StudyId,
    pub state: StudyState,
    pub counts_by_status: HashMap<TrialStatus, usize>,
    pub best_trial: Option<BestTrial>,
    pub rung_populations: Vec<RungPopulation>,
}

impl StudyStatusView {
    pub fn total_terminal(&self) -> usize {
        [TrialStatus::Succeeded, TrialStatus::Pruned, TrialStatus::Failed]
            .iter()
            .map(|s| self.counts_by_status.get(s).copied().unwrap_or(0))
            .sum()
    }

    pub fn running(&self) -> usize {
        self.counts_by_status
            .get(&TrialStatus::Running)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_terminal_sums_terminal_statuses() {
        let mut counts = HashMap::new();
        counts.insert(TrialStatus::Succeeded, 3);
        counts.insert(TrialStatus::Pruned, 2);
        counts.insert(TrialStatus::Failed, 1);
        counts.insert(TrialStatus::Running, 4);

        let view = StudyStatusView {
            study_id: uuid::Uuid::new_v4(),
            state: StudyState::Running,
            counts_by_status: counts,
            best_trial: None,
            rung_populations: Vec::new(),
        };
        assert_eq!(view.total_terminal(), 6);
        assert_eq!(view.running(), 4);
    }
}

//! Builds the read-only [`StudyStatusView`] an external dashboard consumes,
//! from whatever the Store currently holds.

use std::collections::HashMap;

use hpo_store::Store;
use hpo_types::{BestTrial, Goal, HpoResult, RungPopulation, StudyId, StudyStatusView, TrialStatus};

pub async fn status_view(store: &dyn Store, study_id: StudyId, goal: Goal) -> HpoResult<StudyStatusView> {
    let record = store.get_study(study_id).await?;
    let trials = store.list_trials(study_id).await?;

    let mut counts_by_status: HashMap<TrialStatus, usize> = HashMap::new();
    for trial in &trials {
        *counts_by_status.entry(trial.status).or_insert(0) += 1;
    }

    let best_trial = trials
        .iter()
        .filter(|t| t.status == TrialStatus::Succeeded)
        .fold(None, |best: Option<&hpo_types::Trial>, candidate| {
            match (&best, candidate.final_score) {
                (None, Some(_)) => Some(candidate),
                (Some(current), Some(score)) if goal.improves(score, current.final_score.unwrap()) => Some(candidate),
                _ => best,
            }
        })
        .map(|t| BestTrial {
            trial_id: t.id,
            parameters: t.parameters.clone(),
            score: t.final_score.unwrap_or(f64::NAN),
        });

    let mut populations: HashMap<(hpo_types::BracketId, u32), usize> = HashMap::new();
    for trial in &trials {
        let Some(bracket_id) = trial.bracket_id else {
            continue;
        };
        for observation in &trial.observations {
            *populations.entry((bracket_id, observation.rung_index)).or_insert(0) += 1;
        }
    }
    let mut rung_populations: Vec<RungPopulation> = populations
        .into_iter()
        .map(|((bracket_id, rung_index), population)| RungPopulation {
            bracket_id,
            rung_index,
            population,
        })
        .collect();
    rung_populations.sort_by_key(|p| (p.bracket_id, p.rung_index));

    Ok(StudyStatusView {
        study_id,
        state: record.state,
        counts_by_status,
        best_trial,
        rung_populations,
    })
}

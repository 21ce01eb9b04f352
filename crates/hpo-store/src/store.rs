//! The `Store` trait: durable, concurrent repository of studies, trials, and
//! observations. Two implementations exist behind this trait:
//! [`crate::memory::InMemoryStore`] and, behind the `postgres` feature,
//! [`crate::postgres::PostgresStore`]. Both must preserve every invariant
//! documented on the trait methods below.

use async_trait::async_trait;
use hpo_types::{HpoResult, StudyConfig, StudyId, StudyRecord, StudyState, Trial, TrialId, TrialStatus};

/// Durable, concurrent repository of studies, trials, and intermediate
/// observations.
///
/// Concurrency contract: all operations are linearizable per-study. Readers
/// see a consistent snapshot of trials; a trial transition and the
/// observation that caused it are applied as one atomic unit when both are
/// requested via [`Store::record_observation`]. There is no global lock
/// across studies.
#[async_trait]
pub trait Store: Send + Sync {
    /// Register a new study. Errors if a study with this id already exists.
    async fn put_study(&self, config: StudyConfig) -> HpoResult<()>;

    /// Fetch a study's durable record.
    async fn get_study(&self, study_id: StudyId) -> HpoResult<StudyRecord>;

    /// Transition a study's lifecycle state.
    async fn set_study_status(&self, study_id: StudyId, state: StudyState) -> HpoResult<()>;

    /// Append a pending trial, assigning it a trial index and id. Returns the
    /// stored trial.
    async fn add_trial(&self, study_id: StudyId, trial: Trial) -> HpoResult<Trial>;

    /// Apply a state transition to an existing trial. Rejected if the current
    /// status is already terminal.
    async fn update_trial(&self, trial: Trial) -> HpoResult<()>;

    /// All trials for a study, in stable creation order.
    async fn list_trials(&self, study_id: StudyId) -> HpoResult<Vec<Trial>>;

    /// Record a single (trial_id, rung_index, score) observation. Rejected if
    /// this (trial_id, rung_index) pair already has an observation —
    /// observations are write-once.
    async fn record_observation(&self, trial_id: TrialId, rung_index: u32, score: f64) -> HpoResult<()>;

    /// The population of observations at a given rung of a given bracket —
    /// what pruning decisions are made over.
    async fn observations_at_rung(
        &self,
        study_id: StudyId,
        bracket_id: hpo_types::BracketId,
        rung_index: u32,
    ) -> HpoResult<Vec<(TrialId, f64)>>;

    /// Convenience: trials currently in a terminal status, in creation order —
    /// what samplers consume as their `history` argument.
    async fn terminal_history(&self, study_id: StudyId) -> HpoResult<Vec<Trial>> {
        Ok(self
            .list_trials(study_id)
            .await?
            .into_iter()
            .filter(|t| t.status.is_terminal())
            .collect())
    }

    /// Convenience: trials currently running — what a constant-liar sampler
    /// variant consults.
    async fn in_flight(&self, study_id: StudyId) -> HpoResult<Vec<Trial>> {
        Ok(self
            .list_trials(study_id)
            .await?
            .into_iter()
            .filter(|t| t.status == TrialStatus::Running)
            .collect())
    }
}

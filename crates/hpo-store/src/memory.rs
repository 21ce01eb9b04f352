//! In-process `Store` backed by `dashmap`/`parking_lot`, the same
//! sharded-map-plus-per-entry-lock shape as `gb-data`'s market data cache:
//! a `DashMap` gives lock-free per-study sharding, and a `parking_lot::RwLock`
//! around each study's mutable state gives the linearizable-per-study
//! semantics the `Store` trait promises without a single crate-wide mutex.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use hpo_types::{
    BracketId, ConfigError, HpoError, HpoResult, StoreError, StudyConfig, StudyId, StudyRecord, StudyState, Trial,
    TrialId,
};
use parking_lot::RwLock;

use crate::store::Store;

struct StudyEntry {
    record: StudyRecord,
    trials: Vec<Trial>,
    observed: HashMap<(TrialId, u32), ()>,
}

impl StudyEntry {
    fn new(config: StudyConfig) -> Self {
        Self {
            record: StudyRecord::new(config),
            trials: Vec::new(),
            observed: HashMap::new(),
        }
    }

    fn trial_mut(&mut self, trial_id: TrialId) -> HpoResult<&mut Trial> {
        self.trials.iter_mut().find(|t| t.id == trial_id).ok_or_else(|| {
            HpoError::Store(StoreError::TrialNotFound {
                trial_id: trial_id.to_string(),
            })
        })
    }
}

/// In-memory `Store`. Data does not survive process restart; intended for
/// tests, local experimentation, and as the default backend when the
/// `postgres` feature is not enabled.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    studies: DashMap<StudyId, RwLock<StudyEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self { studies: DashMap::new() }
    }

    fn entry(&self, study_id: StudyId) -> HpoResult<dashmap::mapref::one::Ref<'_, StudyId, RwLock<StudyEntry>>> {
        self.studies.get(&study_id).ok_or_else(|| {
            HpoError::Store(StoreError::StudyNotFound {
                study_id: study_id.to_string(),
            })
        })
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_study(&self, config: StudyConfig) -> HpoResult<()> {
        config
            .validate()
            .map_err(|e| HpoError::Configuration(ConfigError::InvalidStudy { message: e.to_string() }))?;
        let study_id = config.id;
        match self.studies.entry(study_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(HpoError::Store(StoreError::Backend {
                message: format!("study {study_id} already exists"),
            })),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(RwLock::new(StudyEntry::new(config)));
                Ok(())
            }
        }
    }

    async fn get_study(&self, study_id: StudyId) -> HpoResult<StudyRecord> {
        Ok(self.entry(study_id)?.read().record.clone())
    }

    async fn set_study_status(&self, study_id: StudyId, state: StudyState) -> HpoResult<()> {
        let entry = self.entry(study_id)?;
        let mut guard = entry.write();
        guard.record.state = state;
        if matches!(state, StudyState::Completed | StudyState::Cancelled | StudyState::Failed) {
            guard.record.finished_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn add_trial(&self, study_id: StudyId, mut trial: Trial) -> HpoResult<Trial> {
        let entry = self.entry(study_id)?;
        let mut guard = entry.write();
        trial.trial_index = guard.trials.len();
        guard.record.next_trial_index = trial.trial_index + 1;
        guard.trials.push(trial.clone());
        Ok(trial)
    }

    async fn update_trial(&self, trial: Trial) -> HpoResult<()> {
        let entry = self.entry(trial.study_id)?;
        let mut guard = entry.write();
        let existing = guard.trial_mut(trial.id)?;
        if existing.status.is_terminal() {
            return Err(HpoError::Store(StoreError::AlreadyTerminal {
                trial_id: trial.id.to_string(),
                attempted: format!("{:?}", trial.status),
            }));
        }
        *existing = trial;
        Ok(())
    }

    async fn list_trials(&self, study_id: StudyId) -> HpoResult<Vec<Trial>> {
        Ok(self.entry(study_id)?.read().trials.clone())
    }

    async fn record_observation(&self, trial_id: TrialId, rung_index: u32, score: f64) -> HpoResult<()> {
        // Trials only belong to one study at a time, but the key we hold is
        // only the trial id, so scan studies to find the owner. Studies are
        // typically few and long-lived relative to trials, so this is cheap
        // compared to per-trial locking overhead.
        for study in self.studies.iter() {
            let mut guard = study.write();
            if !guard.trials.iter().any(|t| t.id == trial_id) {
                continue;
            }
            let key = (trial_id, rung_index);
            if guard.observed.contains_key(&key) {
                return Err(HpoError::Store(StoreError::DuplicateObservation {
                    trial_id: trial_id.to_string(),
                    rung_index,
                }));
            }
            guard.observed.insert(key, ());
            let trial = guard.trial_mut(trial_id)?;
            if trial.status.is_terminal() {
                return Err(HpoError::Store(StoreError::AlreadyTerminal {
                    trial_id: trial_id.to_string(),
                    attempted: "record_observation".to_string(),
                }));
            }
            trial.push_observation(rung_index, score);
            return Ok(());
        }
        Err(HpoError::Store(StoreError::TrialNotFound {
            trial_id: trial_id.to_string(),
        }))
    }

    async fn observations_at_rung(
        &self,
        study_id: StudyId,
        bracket_id: BracketId,
        rung_index: u32,
    ) -> HpoResult<Vec<(TrialId, f64)>> {
        let entry = self.entry(study_id)?;
        let guard = entry.read();
        Ok(guard
            .trials
            .iter()
            .filter(|t| t.bracket_id == Some(bracket_id))
            .filter_map(|t| {
                t.observations
                    .iter()
                    .find(|o| o.rung_index == rung_index)
                    .map(|o| (t.id, o.score))
            })
            .collect())
    }
}

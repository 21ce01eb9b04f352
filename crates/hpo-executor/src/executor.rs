//! Turns a Study specification into a completed Study: the submit-loop
//! that drives sampler -> worker pool -> pruner -> Store, generalized from
//! the reference's accept-loop-per-connection (`TcpListener::accept` inside
//! a `loop`, one `tokio::spawn` per connection) to a submit-loop-per-trial
//! (free worker slot -> sample -> `tokio::spawn` one worker per trial).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hpo_pruner::Pruner;
use hpo_store::Store;
use hpo_types::{
    rng::rng_for, ConfigError, Goal, HpoError, HpoResult, StudyConfig, StudyId, StudyState, Trial, TrialId,
    TelemetryEvent, TelemetrySink, TracingTelemetrySink, TrialStatus,
};

use crate::objective::Objective;
use crate::worker::{run_worker, WorkerOutcome};

/// The terminal outcome of a `run` call: the study's final durable record
/// plus its best trial (by goal), if any trial succeeded.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub study_id: StudyId,
    pub state: StudyState,
    pub terminal_trials: Vec<Trial>,
    pub best_trial: Option<Trial>,
    /// Populated when `state == Failed`: why the study stopped early. A
    /// Store or Pruner failure never surfaces as `Err` from `run` — the
    /// returned value always carries enough state to diagnose a failed
    /// study, per the error-handling design's "no silent success" rule.
    pub error: Option<String>,
}

pub struct Executor {
    store: Arc<dyn Store>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Executor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            telemetry: Arc::new(TracingTelemetrySink),
        }
    }

    pub fn with_telemetry(store: Arc<dyn Store>, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self { store, telemetry }
    }

    /// External cancellation handle: flip this to request the study stop
    /// dispatching new trials and signal in-flight ones to prune at their
    /// next report.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn run(&self, config: StudyConfig, objective: Arc<dyn Objective>) -> HpoResult<ExecutionOutcome> {
        self.run_cancellable(config, objective, Arc::new(AtomicBool::new(false))).await
    }

    /// Like `run`, but takes an externally-owned cancellation flag so a
    /// caller can request cancellation from another task (`cancel.store(true, ...)`)
    /// while `run` is in flight.
    pub async fn run_cancellable(
        &self,
        config: StudyConfig,
        objective: Arc<dyn Objective>,
        cancel: Arc<AtomicBool>,
    ) -> HpoResult<ExecutionOutcome> {
        config.validate()?;
        let space = config
            .search_space
            .clone()
            .ok_or_else(|| ConfigError::InvalidStudy {
                message: "study has no search space".to_string(),
            })?;

        self.store.put_study(config.clone()).await?;

        let sampler = hpo_sampler::build_sampler(&config);
        let pruner: Arc<dyn Pruner> = Arc::from(hpo_pruner::build_pruner(config.pruner, config.hyperband));

        let mut join_set = tokio::task::JoinSet::new();
        let mut in_flight: HashMap<TrialId, ()> = HashMap::new();
        let mut dispatched = 0usize;
        let mut fatal: Option<HpoError> = None;

        'dispatch: loop {
            if fatal.is_some() || cancel.load(Ordering::Relaxed) {
                break;
            }

            while in_flight.len() < config.parallelism && dispatched < config.max_trials {
                let trial_index = dispatched;
                let resolved_space = space.resolve(trial_index);
                let history = match self.store.terminal_history(config.id).await {
                    Ok(h) => h,
                    Err(err) => {
                        fatal = Some(err);
                        break 'dispatch;
                    }
                };
                let mut rng = rng_for(config.seed, trial_index);
                let params = match sampler.propose(&resolved_space, trial_index, &history, &mut rng) {
                    Ok(p) => p,
                    Err(_) => {
                        // Sampler error: fall back to a uniform draw for this
                        // step and keep going (logged, not fatal).
                        tracing::warn!(trial_index, "sampler error, falling back to random draw");
                        let mut fallback_rng = rng_for(config.seed, trial_index);
                        match hpo_sampler::RandomSampler.propose(&resolved_space, trial_index, &history, &mut fallback_rng) {
                            Ok(p) => p,
                            Err(err) => {
                                fatal = Some(err);
                                break 'dispatch;
                            }
                        }
                    }
                };

                let mut trial = Trial::new_pending(config.id, trial_index, params);
                trial.bracket_id = pruner.assign_bracket(trial_index);

                let stored = match self.store.add_trial(config.id, trial).await {
                    Ok(t) => t,
                    Err(err) => {
                        fatal = Some(err);
                        break 'dispatch;
                    }
                };
                let mut running = stored;
                running.mark_running();
                if let Err(err) = self.store.update_trial(running.clone()).await {
                    fatal = Some(err);
                    break 'dispatch;
                }

                self.telemetry.emit(TelemetryEvent::TrialStarted {
                    study_id: config.id,
                    trial_id: running.id,
                });

                in_flight.insert(running.id, ());
                dispatched += 1;

                let worker_store = self.store.clone();
                let worker_pruner = pruner.clone();
                let worker_objective = objective.clone();
                let worker_telemetry = self.telemetry.clone();
                let worker_cancel = cancel.clone();
                let worker_goal = config.goal;
                join_set.spawn(run_worker(
                    worker_store,
                    worker_pruner,
                    worker_objective,
                    worker_telemetry,
                    worker_goal,
                    running,
                    worker_cancel,
                ));
            }

            if in_flight.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok(outcome)) => {
                    self.handle_outcome(&config, outcome, &mut in_flight, &mut fatal);
                }
                Some(Err(join_err)) => {
                    tracing::error!(%join_err, "worker task panicked");
                }
                None => break,
            }
        }

        // Drain remaining workers (cancellation or fatal error mid-flight).
        while let Some(joined) = join_set.join_next().await {
            if let Ok(outcome) = joined {
                self.handle_outcome(&config, outcome, &mut in_flight, &mut fatal);
            }
        }

        let final_state = if fatal.is_some() {
            StudyState::Failed
        } else if cancel.load(Ordering::Relaxed) {
            StudyState::Cancelled
        } else {
            StudyState::Completed
        };

        if let Some(err) = &fatal {
            let _ = self.store.set_study_status(config.id, StudyState::Failed).await;
            tracing::error!(%err, "study failed");
        } else {
            self.store.set_study_status(config.id, final_state).await?;
        }

        self.telemetry.emit(TelemetryEvent::StudyCompleted { study_id: config.id });

        let terminal_trials = self.store.terminal_history(config.id).await?;
        let best_trial = best_of(&terminal_trials, config.goal);
        let error = fatal.as_ref().map(|e| e.to_string());

        Ok(ExecutionOutcome {
            study_id: config.id,
            state: final_state,
            terminal_trials,
            best_trial,
            error,
        })
    }

    fn handle_outcome(
        &self,
        config: &StudyConfig,
        outcome: WorkerOutcome,
        in_flight: &mut HashMap<TrialId, ()>,
        fatal: &mut Option<HpoError>,
    ) {
        in_flight.remove(&outcome.trial.id);
        match outcome.trial.status {
            TrialStatus::Succeeded => {
                self.telemetry.emit(TelemetryEvent::TrialSucceeded {
                    study_id: config.id,
                    trial_id: outcome.trial.id,
                    score: outcome.trial.final_score.unwrap_or(f64::NAN),
                });
            }
            TrialStatus::Pruned => {
                self.telemetry.emit(TelemetryEvent::TrialPruned {
                    study_id: config.id,
                    trial_id: outcome.trial.id,
                });
            }
            TrialStatus::Failed => {
                self.telemetry.emit(TelemetryEvent::TrialFailed {
                    study_id: config.id,
                    trial_id: outcome.trial.id,
                    kind: outcome.trial.failure_kind.clone().unwrap_or_default(),
                });
            }
            _ => {}
        }
        if fatal.is_none() {
            *fatal = outcome.fatal;
        }
    }
}

fn best_of(trials: &[Trial], goal: Goal) -> Option<Trial> {
    trials
        .iter()
        .filter(|t| t.status == TrialStatus::Succeeded)
        .fold(None, |best: Option<&Trial>, candidate| match (&best, candidate.final_score) {
            (None, Some(_)) => Some(candidate),
            (Some(current), Some(score)) if goal.improves(score, current.final_score.unwrap()) => Some(candidate),
            _ => best,
        })
        .cloned()
}

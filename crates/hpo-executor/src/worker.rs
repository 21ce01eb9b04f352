//! One worker: evaluates a single trial's objective, mediating its report
//! callbacks against the Store and Pruner, and returns the terminal trial
//! (or a fatal store error, which is escalated to the whole study).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hpo_pruner::{Pruner, PruneContext};
use hpo_store::Store;
use hpo_types::{Goal, HpoError, StudyId, TelemetryEvent, TelemetrySink, Trial, TrialId};
use tokio::sync::mpsc;

use crate::objective::{Objective, PruneDecision, ReportHandle};

pub struct WorkerOutcome {
    pub trial: Trial,
    /// Set when a Store write failed. Per the error-handling design, a
    /// Store error is fatal to the whole study, not just this trial.
    pub fatal: Option<HpoError>,
}

/// Runs one trial to completion: spawns a report-mediation loop alongside
/// the objective, then commits the terminal status.
pub async fn run_worker(
    store: Arc<dyn Store>,
    pruner: Arc<dyn Pruner>,
    objective: Arc<dyn Objective>,
    telemetry: Arc<dyn TelemetrySink>,
    goal: Goal,
    mut trial: Trial,
    cancel: Arc<AtomicBool>,
) -> WorkerOutcome {
    let (report_tx, report_rx) = mpsc::channel(1);
    let (decision_tx, decision_rx) = mpsc::channel(1);
    let reporter = ReportHandle {
        report_tx,
        decision_rx,
    };

    let trial_id = trial.id;
    let study_id = trial.study_id;
    let bracket_id = trial.bracket_id;
    let params = trial.parameters.clone();
    let pruned = Arc::new(AtomicBool::new(false));

    let mediation_store = store.clone();
    let mediation_pruner = pruner.clone();
    let mediation_telemetry = telemetry.clone();
    let mediation_cancel = cancel.clone();
    let mediation_pruned = pruned.clone();
    let mediation = tokio::spawn(mediate_reports(
        mediation_store,
        mediation_pruner,
        mediation_telemetry,
        goal,
        study_id,
        trial_id,
        bracket_id,
        report_rx,
        decision_tx,
        mediation_cancel,
        mediation_pruned,
    ));

    let result = objective.evaluate(params, reporter).await;
    let fatal = match mediation.await {
        Ok(fatal) => fatal,
        Err(_) => None,
    };

    // The pruner's last decision to this trial wins over whatever the
    // objective itself returned: it was told to stop, so its return value
    // (Ok or Err) reflects an interrupted run, not a real success or failure.
    if pruned.load(Ordering::Relaxed) {
        trial.mark_pruned();
    } else {
        match result {
            Ok(score) => trial.mark_succeeded(score),
            Err(kind) => trial.mark_failed(kind),
        }
    }

    let update_result = store.update_trial(trial.clone()).await;
    let fatal = fatal.or(update_result.err());

    WorkerOutcome { trial, fatal }
}

#[allow(clippy::too_many_arguments)]
async fn mediate_reports(
    store: Arc<dyn Store>,
    pruner: Arc<dyn Pruner>,
    telemetry: Arc<dyn TelemetrySink>,
    goal: Goal,
    study_id: StudyId,
    trial_id: TrialId,
    bracket_id: Option<hpo_types::BracketId>,
    mut report_rx: mpsc::Receiver<(f64, u32)>,
    decision_tx: mpsc::Sender<PruneDecision>,
    cancel: Arc<AtomicBool>,
    pruned: Arc<AtomicBool>,
) -> Option<HpoError> {
    while let Some((score, rung_index)) = report_rx.recv().await {
        if cancel.load(Ordering::Relaxed) {
            pruned.store(true, Ordering::Relaxed);
            let _ = decision_tx.send(PruneDecision::Prune).await;
            continue;
        }

        if let Err(err) = store.record_observation(trial_id, rung_index, score).await {
            let _ = decision_tx.send(PruneDecision::Prune).await;
            return Some(err);
        }
        telemetry.emit(TelemetryEvent::TrialReported {
            study_id,
            trial_id,
            rung_index,
            score,
        });

        let decision = match bracket_id {
            None => PruneDecision::Continue,
            Some(bracket_id) => match store.observations_at_rung(study_id, bracket_id, rung_index).await {
                Ok(raw_peers) => {
                    let peers: Vec<hpo_pruner::RungPeer> = raw_peers
                        .into_iter()
                        .enumerate()
                        .map(|(order, (id, s))| {
                            let normalized = match goal {
                                Goal::Minimize => -s,
                                Goal::Maximize => s,
                            };
                            (id, normalized, order)
                        })
                        .collect();
                    let context = PruneContext { goal, study_id };
                    match pruner.keep(&context, trial_id, Some(bracket_id), rung_index, &peers) {
                        Ok(true) => PruneDecision::Continue,
                        Ok(false) => PruneDecision::Prune,
                        Err(err) => {
                            // Pruner error is fatal to the study (data
                            // integrity), but this trial still needs a
                            // decision so the objective returns promptly.
                            let _ = decision_tx.send(PruneDecision::Prune).await;
                            return Some(err);
                        }
                    }
                }
                Err(err) => {
                    let _ = decision_tx.send(PruneDecision::Prune).await;
                    return Some(err);
                }
            },
        };
        if decision == PruneDecision::Prune {
            pruned.store(true, Ordering::Relaxed);
        }
        let _ = decision_tx.send(decision).await;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_pruner::SuccessiveHalvingPruner;
    use hpo_store::{InMemoryStore, Store};
    use hpo_types::{HyperbandConfig, ParamMap, StudyConfig, Trial, TracingTelemetrySink};

    async fn seed_peer(store: &InMemoryStore, study_id: StudyId, bracket_id: u32, score: f64) {
        let mut trial = Trial::new_pending(study_id, 0, ParamMap::new());
        trial.bracket_id = Some(bracket_id);
        let mut stored = store.add_trial(study_id, trial).await.unwrap();
        stored.mark_running();
        store.update_trial(stored.clone()).await.unwrap();
        store.record_observation(stored.id, 0, score).await.unwrap();
    }

    /// Scenario 4 from the executor's spec: a trial reporting 0.1 alongside
    /// five peers already at 0.9 is pruned at rung 0 once warmup (>=3 peers)
    /// is satisfied, eta=3.
    #[tokio::test]
    async fn mediate_reports_prunes_laggard_once_warmup_satisfied() {
        let store = InMemoryStore::new();
        let config = StudyConfig::new("s", Goal::Maximize);
        let study_id = config.id;
        store.put_study(config).await.unwrap();

        for _ in 0..5 {
            seed_peer(&store, study_id, 0, 0.9).await;
        }

        let mut probe = Trial::new_pending(study_id, 5, ParamMap::new());
        probe.bracket_id = Some(0);
        let mut probe = store.add_trial(study_id, probe).await.unwrap();
        probe.mark_running();
        store.update_trial(probe.clone()).await.unwrap();

        let pruner: Arc<dyn Pruner> = Arc::new(SuccessiveHalvingPruner::new(HyperbandConfig {
            reduction_factor: 3.0,
            warmup_peers: 3,
            ..Default::default()
        }));

        let (report_tx, report_rx) = mpsc::channel(1);
        let (decision_tx, mut decision_rx) = mpsc::channel(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let pruned = Arc::new(AtomicBool::new(false));

        let store_for_task: Arc<dyn Store> = Arc::new(store);
        let mediation = tokio::spawn(mediate_reports(
            store_for_task.clone(),
            pruner,
            Arc::new(TracingTelemetrySink),
            Goal::Maximize,
            study_id,
            probe.id,
            Some(0),
            report_rx,
            decision_tx,
            cancel,
            pruned.clone(),
        ));

        report_tx.send((0.1, 0)).await.unwrap();
        let decision = decision_rx.recv().await.unwrap();
        assert_eq!(decision, PruneDecision::Prune);
        assert!(pruned.load(Ordering::Relaxed));

        drop(report_tx);
        assert!(mediation.await.unwrap().is_none());
    }

    /// The mirror of the above: a trial that is itself in the lead among its
    /// peers survives its rung-0 report.
    #[tokio::test]
    async fn mediate_reports_keeps_leader_once_warmup_satisfied() {
        let store = InMemoryStore::new();
        let config = StudyConfig::new("s", Goal::Maximize);
        let study_id = config.id;
        store.put_study(config).await.unwrap();

        for _ in 0..5 {
            seed_peer(&store, study_id, 0, 0.1).await;
        }

        let mut probe = Trial::new_pending(study_id, 5, ParamMap::new());
        probe.bracket_id = Some(0);
        let mut probe = store.add_trial(study_id, probe).await.unwrap();
        probe.mark_running();
        store.update_trial(probe.clone()).await.unwrap();

        let pruner: Arc<dyn Pruner> = Arc::new(SuccessiveHalvingPruner::new(HyperbandConfig {
            reduction_factor: 3.0,
            warmup_peers: 3,
            ..Default::default()
        }));

        let (report_tx, report_rx) = mpsc::channel(1);
        let (decision_tx, mut decision_rx) = mpsc::channel(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let pruned = Arc::new(AtomicBool::new(false));

        let store_for_task: Arc<dyn Store> = Arc::new(store);
        let mediation = tokio::spawn(mediate_reports(
            store_for_task.clone(),
            pruner,
            Arc::new(TracingTelemetrySink),
            Goal::Maximize,
            study_id,
            probe.id,
            Some(0),
            report_rx,
            decision_tx,
            cancel,
            pruned.clone(),
        ));

        report_tx.send((0.9, 0)).await.unwrap();
        let decision = decision_rx.recv().await.unwrap();
        assert_eq!(decision, PruneDecision::Continue);
        assert!(!pruned.load(Ordering::Relaxed));

        drop(report_tx);
        assert!(mediation.await.unwrap().is_none());
    }

    /// A cancellation signal preempts the pruner entirely: the next report is
    /// synthetically pruned regardless of score.
    #[tokio::test]
    async fn mediate_reports_honors_cancellation() {
        let store = InMemoryStore::new();
        let config = StudyConfig::new("s", Goal::Maximize);
        let study_id = config.id;
        store.put_study(config).await.unwrap();

        let mut probe = Trial::new_pending(study_id, 0, ParamMap::new());
        let mut probe = store.add_trial(study_id, probe).await.unwrap();
        probe.mark_running();
        store.update_trial(probe.clone()).await.unwrap();

        let pruner: Arc<dyn Pruner> = Arc::new(SuccessiveHalvingPruner::new(HyperbandConfig::default()));
        let (report_tx, report_rx) = mpsc::channel(1);
        let (decision_tx, mut decision_rx) = mpsc::channel(1);
        let cancel = Arc::new(AtomicBool::new(true));
        let pruned = Arc::new(AtomicBool::new(false));

        let store_for_task: Arc<dyn Store> = Arc::new(store);
        let mediation = tokio::spawn(mediate_reports(
            store_for_task,
            pruner,
            Arc::new(TracingTelemetrySink),
            Goal::Maximize,
            study_id,
            probe.id,
            None,
            report_rx,
            decision_tx,
            cancel,
            pruned.clone(),
        ));

        report_tx.send((0.99, 0)).await.unwrap();
        let decision = decision_rx.recv().await.unwrap();
        assert_eq!(decision, PruneDecision::Prune);
        assert!(pruned.load(Ordering::Relaxed));

        drop(report_tx);
        mediation.await.unwrap();
    }
}

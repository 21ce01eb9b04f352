//! End-to-end scenarios drawn directly from the executor's testable
//! properties: a full `Executor::run` against a real `SearchSpace`, a real
//! sampler/pruner pair, and an `InMemoryStore`, exercised the way a host
//! program actually uses this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hpo_executor::{Executor, SimpleObjective};
use hpo_store::InMemoryStore;
use hpo_types::{Goal, HyperbandConfig, ParamMap, PrunerKind, SamplerKind, SearchSpace, StudyConfig, TpeConfig, TrialStatus};

fn xy(params: &ParamMap) -> (f64, f64) {
    let x = params.get("x").unwrap().as_f64().unwrap();
    let y = params.get("y").unwrap().as_f64().unwrap();
    (x, y)
}

/// Scenario 1: minimize `(x-2)^2 + (y-3)^2` over `uniform(-5,10)^2`, seed=42,
/// 50 trials, TPE multivariate, parallelism=1. The best trial must land
/// within 0.01 squared-distance of the optimum.
#[tokio::test]
async fn quadratic_bowl_converges_with_tpe_multivariate() {
    let store = Arc::new(InMemoryStore::new());
    let space = SearchSpace::new().add_uniform("x", -5.0, 10.0).add_uniform("y", -5.0, 10.0);
    let config = StudyConfig::new("quadratic-bowl", Goal::Minimize)
        .with_search_space(space)
        .with_max_trials(50)
        .with_parallelism(1)
        .with_seed(42)
        .with_sampler(
            SamplerKind::Tpe,
            TpeConfig {
                multivariate: true,
                ..Default::default()
            },
        );

    let objective = Arc::new(SimpleObjective::new(|params: ParamMap| async move {
        let (x, y) = xy(&params);
        Ok((x - 2.0).powi(2) + (y - 3.0).powi(2))
    }));

    let executor = Executor::new(store);
    let outcome = executor.run(config, objective).await.unwrap();

    let best = outcome.best_trial.expect("at least one trial should succeed");
    assert!(best.final_score.unwrap() < 0.01, "best score {:?} not within tolerance", best.final_score);
}

/// Scenario 2: mean best-of-run over 10 seeds on Rastrigin must be < 5.0,
/// 100 trials per run, TPE multivariate.
#[tokio::test]
async fn rastrigin_mean_best_across_seeds_is_small() {
    fn rastrigin(x: f64, y: f64) -> f64 {
        let term = |v: f64| v * v - 10.0 * (2.0 * std::f64::consts::PI * v).cos();
        20.0 + term(x) + term(y)
    }

    let mut bests = Vec::new();
    for seed in 1..=10u64 {
        let store = Arc::new(InMemoryStore::new());
        let space = SearchSpace::new()
            .add_uniform("x", -5.12, 5.12)
            .add_uniform("y", -5.12, 5.12);
        let config = StudyConfig::new("rastrigin", Goal::Minimize)
            .with_search_space(space)
            .with_max_trials(100)
            .with_parallelism(1)
            .with_seed(seed)
            .with_sampler(
                SamplerKind::Tpe,
                TpeConfig {
                    multivariate: true,
                    ..Default::default()
                },
            );

        let objective = Arc::new(SimpleObjective::new(|params: ParamMap| async move {
            let (x, y) = xy(&params);
            Ok(rastrigin(x, y))
        }));

        let executor = Executor::new(store);
        let outcome = executor.run(config, objective).await.unwrap();
        let best = outcome.best_trial.expect("at least one trial should succeed");
        bests.push(best.final_score.unwrap());
    }

    let mean: f64 = bests.iter().sum::<f64>() / bests.len() as f64;
    assert!(mean < 5.0, "mean best {mean} across seeds not below bound; bests={bests:?}");
}

/// Scenario 5: with parallelism=4 and an objective that fails on ~30% of
/// calls, the study still reaches exactly `max_trials` terminal trials with
/// a non-empty best trial.
#[tokio::test]
async fn partial_failures_still_reach_max_trials() {
    let store = Arc::new(InMemoryStore::new());
    let space = SearchSpace::new().add_uniform("x", 0.0, 1.0);
    let config = StudyConfig::new("flaky", Goal::Minimize)
        .with_search_space(space)
        .with_max_trials(30)
        .with_parallelism(4)
        .with_seed(7);

    let call_count = Arc::new(AtomicUsize::new(0));
    let objective = Arc::new(SimpleObjective::new({
        let call_count = call_count.clone();
        move |params: ParamMap| {
            let call_count = call_count.clone();
            async move {
                let n = call_count.fetch_add(1, Ordering::SeqCst);
                if n % 10 < 3 {
                    Err("synthetic failure".to_string())
                } else {
                    Ok(params.get("x").unwrap().as_f64().unwrap())
                }
            }
        }
    }));

    let executor = Executor::new(store);
    let outcome = executor.run(config, objective).await.unwrap();

    let terminal = outcome.terminal_trials.len();
    assert_eq!(terminal, 30, "all 30 trials must reach a terminal status");
    assert!(outcome.terminal_trials.iter().any(|t| t.status == TrialStatus::Failed));
    assert!(outcome.best_trial.is_some());
}

/// Scenario 6: cancelling mid-run transitions the study to `Cancelled` and
/// the returned outcome's terminal trial count matches what had actually
/// completed by then.
#[tokio::test]
async fn cancellation_yields_consistent_terminal_count() {
    let store = Arc::new(InMemoryStore::new());
    let space = SearchSpace::new().add_uniform("x", 0.0, 1.0);
    let config = StudyConfig::new("cancel-me", Goal::Minimize)
        .with_search_space(space)
        .with_max_trials(100)
        .with_parallelism(2)
        .with_seed(1);

    let objective = Arc::new(SimpleObjective::new(|params: ParamMap| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(params.get("x").unwrap().as_f64().unwrap())
    }));

    let cancel = Arc::new(AtomicBool::new(false));
    let executor = Executor::new(store);

    let run_cancel = cancel.clone();
    let config_clone = config.clone();
    let run = tokio::spawn(async move { executor.run_cancellable(config_clone, objective, run_cancel).await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.store(true, Ordering::SeqCst);

    let outcome = run.await.unwrap().unwrap();
    assert_eq!(outcome.state, hpo_types::StudyState::Cancelled);
    assert!(outcome.terminal_trials.len() < 100, "cancellation should stop well short of max_trials");
    assert!(!outcome.terminal_trials.is_empty());
}

/// Scenario: a pruner configured with `reduction_factor=1` degenerates to
/// plain parallel random search — no trial is ever pruned.
#[tokio::test]
async fn reduction_factor_one_never_prunes_end_to_end() {
    let store = Arc::new(InMemoryStore::new());
    let space = SearchSpace::new().add_uniform("x", 0.0, 1.0);
    let config = StudyConfig::new("no-prune", Goal::Maximize)
        .with_search_space(space)
        .with_max_trials(12)
        .with_parallelism(3)
        .with_seed(3)
        .with_pruner(
            PrunerKind::SuccessiveHalving,
            HyperbandConfig {
                reduction_factor: 1.0,
                ..Default::default()
            },
        );

    let objective = Arc::new(SimpleObjective::new(|params: ParamMap| async move {
        Ok(params.get("x").unwrap().as_f64().unwrap())
    }));

    let executor = Executor::new(store);
    let outcome = executor.run(config, objective).await.unwrap();
    assert!(outcome.terminal_trials.iter().all(|t| t.status != TrialStatus::Pruned));
}

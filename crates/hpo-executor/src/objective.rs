//! The objective contract: a user-supplied function evaluated against one
//! trial's parameter assignment, reporting intermediate scores through a
//! callback that returns a prune decision.
//!
//! Rust has first-class closures, but a callback that must itself `.await`
//! a pruner decision doesn't fit neatly behind `&dyn Fn`, so — per the
//! design note for "coroutine-style progressive evaluation" — this is a
//! channel pair (report channel, decision channel) wrapped in [`ReportHandle`]
//! instead of a literal callback.

use async_trait::async_trait;
use hpo_types::ParamMap;
use tokio::sync::mpsc;

/// What a report callback invocation resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneDecision {
    Continue,
    Prune,
}

/// The live end of the report channel pair handed to an objective. Every
/// `report` call blocks until the executor's worker loop has recorded the
/// observation and consulted the pruner.
pub struct ReportHandle {
    pub(crate) report_tx: mpsc::Sender<(f64, u32)>,
    pub(crate) decision_rx: mpsc::Receiver<PruneDecision>,
}

impl ReportHandle {
    /// Report an intermediate score at `rung_index`. Rungs must be reported
    /// in strictly increasing order; the executor does not enforce this
    /// directly (that is the objective's contract to honor), but `record_observation`
    /// rejects a duplicate (trial, rung) pair.
    pub async fn report(&mut self, score: f64, rung_index: u32) -> PruneDecision {
        if self.report_tx.send((score, rung_index)).await.is_err() {
            // Worker loop gone (study cancelled, store failed): treat as prune
            // so the objective honors the contract and returns promptly.
            return PruneDecision::Prune;
        }
        self.decision_rx.recv().await.unwrap_or(PruneDecision::Prune)
    }
}

/// A user-supplied objective function. `evaluate` must honor `:prune`
/// (returned from [`ReportHandle::report`]) by promptly returning, and must
/// report rungs in strictly increasing order.
#[async_trait]
pub trait Objective: Send + Sync {
    async fn evaluate(&self, params: ParamMap, reporter: ReportHandle) -> Result<f64, String>;
}

/// Adapts a plain async closure into an [`Objective`], for objectives with
/// no intermediate reporting.
pub struct SimpleObjective<F> {
    f: F,
}

impl<F> SimpleObjective<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Objective for SimpleObjective<F>
where
    F: Fn(ParamMap) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<f64, String>> + Send,
{
    async fn evaluate(&self, params: ParamMap, _reporter: ReportHandle) -> Result<f64, String> {
        (self.f)(params).await
    }
}

//! Early-stopping protocol: assign trials to brackets, then decide at each
//! rung report whether a trial survives to the next one.

use hpo_types::{BracketId, Goal, HpoResult, PrunerError, StudyId, TrialId};

use crate::schedule::HyperbandSchedule;

/// The population reporting at one (bracket, rung): a trial's id, its
/// most-recent score at that rung, and its creation order (used only to
/// break ties deterministically — older trials rank first).
pub type RungPeer = (TrialId, f64, usize);

/// Everything a `keep` decision needs beyond the reporting trial's own
/// score: the study's goal and id (so an implementation may consult the
/// store for the rung population itself rather than receiving it).
#[derive(Debug, Clone, Copy)]
pub struct PruneContext {
    pub goal: Goal,
    pub study_id: StudyId,
}

/// Decides early stopping. `assign_bracket` and `keep` are pure functions of
/// their arguments: no sampler-style RNG threading is needed since the
/// schedule depends only on configuration and deterministic tie-breaking.
pub trait Pruner: Send + Sync {
    /// Assign a bracket to a newly created trial. `None` means the pruner
    /// never prunes (e.g. the `none` pruner, or a degenerate Hyperband
    /// configuration).
    fn assign_bracket(&self, trial_index: usize) -> Option<BracketId>;

    /// Decide whether `trial_id` survives its report at `rung_index`, given
    /// the full population (including itself) that has reported at this
    /// (bracket, rung) so far.
    fn keep(
        &self,
        context: &PruneContext,
        trial_id: TrialId,
        bracket_id: Option<BracketId>,
        rung_index: u32,
        peers: &[RungPeer],
    ) -> HpoResult<bool>;

    fn name(&self) -> &'static str;
}

/// No pruning: every trial runs to completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPruner;

impl Pruner for NoPruner {
    fn assign_bracket(&self, _trial_index: usize) -> Option<BracketId> {
        None
    }

    fn keep(
        &self,
        _context: &PruneContext,
        _trial_id: TrialId,
        _bracket_id: Option<BracketId>,
        _rung_index: u32,
        _peers: &[RungPeer],
    ) -> HpoResult<bool> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Successive Halving / Hyperband.
pub struct SuccessiveHalvingPruner {
    warmup_peers: usize,
    reduction_factor: f64,
    schedule: HyperbandSchedule,
}

impl SuccessiveHalvingPruner {
    pub fn new(config: hpo_types::HyperbandConfig) -> Self {
        let schedule = HyperbandSchedule::build(config.reduction_factor, config.min_resource, config.max_resource);
        Self {
            warmup_peers: config.warmup_peers,
            reduction_factor: config.reduction_factor,
            schedule,
        }
    }

    pub fn schedule(&self) -> &HyperbandSchedule {
        &self.schedule
    }
}

impl Pruner for SuccessiveHalvingPruner {
    fn assign_bracket(&self, trial_index: usize) -> Option<BracketId> {
        Some(self.schedule.assign(trial_index))
    }

    fn keep(
        &self,
        _context: &PruneContext,
        trial_id: TrialId,
        bracket_id: Option<BracketId>,
        rung_index: u32,
        peers: &[RungPeer],
    ) -> HpoResult<bool> {
        let bracket_id = bracket_id.ok_or_else(|| PrunerError::MissingBracketAssignment {
            trial_id: trial_id.to_string(),
        })?;

        if self.reduction_factor <= 1.0 {
            return Ok(true);
        }

        let max_rung = self.schedule.max_rung(bracket_id);
        if rung_index > max_rung {
            return Err(PrunerError::CorruptRungPopulation {
                bracket_id: bracket_id.to_string(),
                rung_index,
            }
            .into());
        }

        if peers.len() < self.warmup_peers {
            return Ok(true);
        }

        let keep_count = ((peers.len() as f64) / self.reduction_factor).floor().max(1.0) as usize;

        let mut ranked: Vec<&RungPeer> = peers.iter().collect();
        ranked.sort_by(|a, b| {
            // This runs under a single, serial pruner call per report, so the
            // goal direction is resolved by the caller via score sign; here
            // we assume "higher score in `peers` means better" has already
            // been normalized — see `keep_with_goal`. Best first, ties
            // broken by creation order (older first).
            b.1.partial_cmp(&a.1)
                .unwrap()
                .then_with(|| a.2.cmp(&b.2))
        });

        Ok(ranked.iter().take(keep_count).any(|p| p.0 == trial_id))
    }

    fn name(&self) -> &'static str {
        "successive_halving"
    }
}

impl SuccessiveHalvingPruner {
    /// Goal-aware entry point: `Pruner::keep` assumes "higher is better" in
    /// `peers`; this normalizes `Minimize` by negating scores before
    /// ranking, so callers needn't pre-sort by direction themselves.
    pub fn keep_with_goal(
        &self,
        goal: Goal,
        trial_id: TrialId,
        bracket_id: Option<BracketId>,
        rung_index: u32,
        peers: &[RungPeer],
    ) -> HpoResult<bool> {
        let normalized: Vec<RungPeer> = peers
            .iter()
            .map(|(id, score, order)| {
                let score = match goal {
                    Goal::Minimize => -*score,
                    Goal::Maximize => *score,
                };
                (*id, score, *order)
            })
            .collect();
        let context = PruneContext {
            goal,
            study_id: uuid::Uuid::nil(),
        };
        self.keep(&context, trial_id, bracket_id, rung_index, &normalized)
    }
}

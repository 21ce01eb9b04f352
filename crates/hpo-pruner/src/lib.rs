//! Early-stopping framework: a `Pruner` trait plus Successive Halving /
//! Hyperband, the only early-stopping strategy this core ships.

pub mod pruner;
pub mod schedule;

pub use pruner::{NoPruner, PruneContext, Pruner, RungPeer, SuccessiveHalvingPruner};
pub use schedule::{BracketSpec, HyperbandSchedule};

use hpo_types::{HyperbandConfig, PrunerKind};

/// Build the configured pruner for a study.
pub fn build_pruner(kind: PrunerKind, config: HyperbandConfig) -> Box<dyn Pruner> {
    match kind {
        PrunerKind::None => Box::new(NoPruner),
        PrunerKind::SuccessiveHalving => Box::new(SuccessiveHalvingPruner::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_pruner_respects_configured_kind() {
        let pruner = build_pruner(PrunerKind::None, HyperbandConfig::default());
        assert_eq!(pruner.name(), "none");

        let pruner = build_pruner(PrunerKind::SuccessiveHalving, HyperbandConfig::default());
        assert_eq!(pruner.name(), "successive_halving");
    }
}

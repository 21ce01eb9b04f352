//! Study records and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::space::DynamicSearchSpace;
use crate::trial::StudyId;

/// Direction of optimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
    Minimize,
    Maximize,
}

impl Goal {
    /// Is `candidate` an improvement over `current` under this goal?
    pub fn improves(&self, candidate: f64, current: f64) -> bool {
        match self {
            Self::Minimize => candidate < current,
            Self::Maximize => candidate > current,
        }
    }
}

/// TPE sampler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TpeConfig {
    pub gamma: f64,
    pub min_obs: usize,
    pub n_candidates: usize,
    pub multivariate: bool,
    pub prior_weight: f64,
}

impl Default for TpeConfig {
    fn default() -> Self {
        Self {
            gamma: 0.25,
            min_obs: 10,
            n_candidates: 24,
            multivariate: false,
            prior_weight: 1.0,
        }
    }
}

/// Hyperband/Successive-Halving pruner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperbandConfig {
    pub reduction_factor: f64,
    pub min_resource: f64,
    pub max_resource: f64,
    pub warmup_peers: usize,
}

impl Default for HyperbandConfig {
    fn default() -> Self {
        Self {
            reduction_factor: 3.0,
            min_resource: 1.0,
            max_resource: 81.0,
            warmup_peers: 3,
        }
    }
}

/// Which sampler backs a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplerKind {
    Random,
    Grid,
    Tpe,
}

/// Which pruner backs a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrunerKind {
    None,
    SuccessiveHalving,
}

/// Top-level configuration for a study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyConfig {
    pub id: StudyId,
    pub name: String,
    pub goal: Goal,
    pub max_trials: usize,
    pub parallelism: usize,
    pub seed: u64,
    pub sampler: SamplerKind,
    pub tpe: TpeConfig,
    pub pruner: PrunerKind,
    pub hyperband: HyperbandConfig,
    #[serde(skip)]
    pub search_space: Option<DynamicSearchSpace>,
}

impl StudyConfig {
    pub fn new(name: impl Into<String>, goal: Goal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            goal,
            max_trials: 100,
            parallelism: 1,
            seed: 0,
            sampler: SamplerKind::Tpe,
            tpe: TpeConfig::default(),
            pruner: PrunerKind::None,
            hyperband: HyperbandConfig::default(),
            search_space: None,
        }
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = n;
        self
    }

    pub fn with_parallelism(mut self, n: usize) -> Self {
        self.parallelism = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerKind, tpe: TpeConfig) -> Self {
        self.sampler = sampler;
        self.tpe = tpe;
        self
    }

    pub fn with_pruner(mut self, pruner: PrunerKind, hyperband: HyperbandConfig) -> Self {
        self.pruner = pruner;
        self.hyperband = hyperband;
        self
    }

    pub fn with_search_space(mut self, space: impl Into<DynamicSearchSpace>) -> Self {
        self.search_space = Some(space.into());
        self
    }

    /// Configuration errors are raised here, before any trials run.
    pub fn validate(&self) -> crate::error::HpoResult<()> {
        use crate::error::ConfigError;
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidParallelism {
                parallelism: self.parallelism,
            }
            .into());
        }
        if self.max_trials == 0 {
            return Err(ConfigError::InvalidMaxTrials {
                max_trials: self.max_trials,
            }
            .into());
        }
        if let Some(space) = &self.search_space {
            if let crate::space::DynamicSearchSpace::Static(s) = space {
                s.validate()?;
            }
        }
        Ok(())
    }
}

/// Lifecycle state for a study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudyState {
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

/// Durable record of a study's configuration and lifecycle state, as kept by the Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyRecord {
    pub config: StudyConfig,
    pub state: StudyState,
    pub next_trial_index: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl StudyRecord {
    pub fn new(config: StudyConfig) -> Self {
        Self {
            config,
            state: StudyState::Running,
            next_trial_index: 0,
            started_at: Some(Utc::now()),
            finished_at: None,
            error: None,
        }
    }
}

use thiserror::Error;

/// Top-level error taxonomy for the optimization engine.
#[derive(Error, Debug)]
pub enum HpoError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),

    #[error("pruner error: {0}")]
    Pruner(#[from] PrunerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("trial failure: {kind}")]
    Trial { kind: String },
}

pub type HpoResult<T> = Result<T, HpoError>;

/// Invalid spec, inconsistent options, parallelism <= 0. Raised at Study construction;
/// no trials are run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid search space bounds: {message}")]
    InvalidBounds { message: String },

    #[error("invalid study configuration: {message}")]
    InvalidStudy { message: String },

    #[error("parallelism must be >= 1, got {parallelism}")]
    InvalidParallelism { parallelism: usize },

    #[error("max_trials must be >= 1, got {max_trials}")]
    InvalidMaxTrials { max_trials: usize },
}

/// Numerical failure in KDE/EI (NaN, overflow). Recovered locally by falling back
/// to a Random proposal for that step; logged.
#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("numerical failure fitting density for dimension {dimension}: {message}")]
    Numerical { dimension: String, message: String },

    #[error("degenerate observation set for dimension {dimension}")]
    Degenerate { dimension: String },
}

/// Missing bracket assignment, corrupt rung population. Fatal to the study
/// (data integrity).
#[derive(Error, Debug)]
pub enum PrunerError {
    #[error("trial {trial_id} has no bracket assignment")]
    MissingBracketAssignment { trial_id: String },

    #[error("corrupt rung population for bracket {bracket_id} rung {rung_index}")]
    CorruptRungPopulation { bracket_id: String, rung_index: u32 },
}

/// Persistence write failure. Fatal to the study; study status becomes `failed`
/// and in-flight trials are cancelled.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("study not found: {study_id}")]
    StudyNotFound { study_id: String },

    #[error("trial not found: {trial_id}")]
    TrialNotFound { trial_id: String },

    #[error("trial {trial_id} is already terminal; transition to {attempted} rejected")]
    AlreadyTerminal { trial_id: String, attempted: String },

    #[error("observation already recorded for trial {trial_id} rung {rung_index}")]
    DuplicateObservation { trial_id: String, rung_index: u32 },

    #[error("backend I/O failure: {message}")]
    Backend { message: String },
}

//! # hpo-executor
//!
//! Turns a [`hpo_types::StudyConfig`] into a completed study run: the
//! submit-loop that drives sampler proposals onto a worker pool, mediates
//! each worker's intermediate reports against the Store and Pruner, and
//! assembles the terminal [`ExecutionOutcome`].

pub mod executor;
pub mod objective;
pub mod status;
pub mod worker;

pub use executor::{ExecutionOutcome, Executor};
pub use objective::{Objective, PruneDecision, ReportHandle, SimpleObjective};
pub use status::status_view;

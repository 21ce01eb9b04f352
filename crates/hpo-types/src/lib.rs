//! # hpo-types
//!
//! Core data model for the optimization engine: search spaces, trial and
//! study records, the error taxonomy, deterministic RNG seeding, the
//! read-only status projection, and telemetry event types.

pub mod error;
pub mod rng;
pub mod space;
pub mod status;
pub mod study;
pub mod telemetry;
pub mod trial;

pub use error::{ConfigError, HpoError, HpoResult, PrunerError, SamplerError, StoreError};
pub use space::{DynamicSearchSpace, ParamMap, ParameterDef, ParameterKind, ParameterValue, SearchSpace};
pub use status::{BestTrial, RungPopulation, StudyStatusView};
pub use study::{Goal, HyperbandConfig, PrunerKind, SamplerKind, StudyConfig, StudyRecord, StudyState, TpeConfig};
pub use telemetry::{TelemetryEvent, TelemetrySink, TracingTelemetrySink};
pub use trial::{BracketId, Observation, StudyId, Trial, TrialId, TrialStatus};

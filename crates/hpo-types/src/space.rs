//! Search space definitions, primitive sampling, and the unit transform used by TPE.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ConfigError, HpoResult};

/// A concrete parameter value produced by a search strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    Categorical(serde_json::Value),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Categorical(v) => write!(f, "{v}"),
        }
    }
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Categorical(_) => None,
        }
    }
}

/// An ordered parameter assignment: name -> value.
pub type ParamMap = BTreeMap<String, ParameterValue>;

/// Describes how a single dimension is sampled.
///
/// Five variants: `uniform`, `log_uniform`, `discrete_uniform`, `int`,
/// `categorical`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Continuous uniform range [low, high].
    Uniform { low: f64, high: f64 },
    /// Log-uniform range: sampled in log-space then exponentiated. Requires low > 0.
    LogUniform { low: f64, high: f64 },
    /// Discrete uniform range with a fixed step.
    DiscreteUniform { low: f64, high: f64, step: f64 },
    /// Integer range [low, high], inclusive.
    Int { low: i64, high: i64 },
    /// Categorical choice among non-empty values.
    Categorical { choices: Vec<serde_json::Value> },
}

impl ParameterKind {
    /// Reject invalid bounds at construction time.
    pub fn validate(&self) -> HpoResult<()> {
        match self {
            Self::Uniform { low, high } => {
                if !(low < high) {
                    return Err(ConfigError::InvalidBounds {
                        message: format!("uniform: low ({low}) must be < high ({high})"),
                    }
                    .into());
                }
            }
            Self::LogUniform { low, high } => {
                if !(*low > 0.0) {
                    return Err(ConfigError::InvalidBounds {
                        message: format!("log_uniform: low ({low}) must be > 0"),
                    }
                    .into());
                }
                if !(low < high) {
                    return Err(ConfigError::InvalidBounds {
                        message: format!("log_uniform: low ({low}) must be < high ({high})"),
                    }
                    .into());
                }
            }
            Self::DiscreteUniform { low, high, step } => {
                if !(low < high) {
                    return Err(ConfigError::InvalidBounds {
                        message: format!("discrete_uniform: low ({low}) must be < high ({high})"),
                    }
                    .into());
                }
                if !(*step > 0.0) {
                    return Err(ConfigError::InvalidBounds {
                        message: format!("discrete_uniform: step ({step}) must be > 0"),
                    }
                    .into());
                }
            }
            Self::Int { low, high } => {
                if low >= high {
                    return Err(ConfigError::InvalidBounds {
                        message: format!("int: low ({low}) must be < high ({high})"),
                    }
                    .into());
                }
            }
            Self::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(ConfigError::InvalidBounds {
                        message: "categorical: choices must be non-empty".to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Does `value` satisfy this spec? Used to check sampler proposals never escape their range.
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (self, value) {
            (Self::Uniform { low, high }, ParameterValue::Float(v)) => *v >= *low && *v <= *high,
            (Self::LogUniform { low, high }, ParameterValue::Float(v)) => {
                *v >= *low && *v <= *high
            }
            (Self::DiscreteUniform { low, high, step }, ParameterValue::Float(v)) => {
                if *v < *low - 1e-9 || *v > *high + 1e-9 {
                    return false;
                }
                let steps = ((v - low) / step).round();
                (v - (low + steps * step)).abs() < 1e-6
            }
            (Self::Int { low, high }, ParameterValue::Int(v)) => *v >= *low && *v <= *high,
            (Self::Categorical { choices }, ParameterValue::Categorical(v)) => {
                choices.contains(v)
            }
            _ => false,
        }
    }

    /// Map a value in this dimension to the unit-transform space TPE operates in.
    pub fn to_unit(&self, value: &ParameterValue) -> f64 {
        match (self, value) {
            (Self::Uniform { low, high }, ParameterValue::Float(v)) => (v - low) / (high - low),
            (Self::LogUniform { low, high }, ParameterValue::Float(v)) => {
                (v.ln() - low.ln()) / (high.ln() - low.ln())
            }
            (Self::DiscreteUniform { low, high, .. }, ParameterValue::Float(v)) => {
                (v - low) / (high - low)
            }
            (Self::Int { low, high }, ParameterValue::Int(v)) => {
                (*v as f64 - (*low as f64 - 0.5)) / ((*high as f64 + 0.5) - (*low as f64 - 0.5))
            }
            (Self::Categorical { choices }, ParameterValue::Categorical(v)) => {
                let idx = choices.iter().position(|c| c == v).unwrap_or(0);
                idx as f64
            }
            _ => 0.5,
        }
    }

    /// Inverse of `to_unit`: map a unit-space value back into parameter space.
    pub fn from_unit(&self, unit: f64) -> ParameterValue {
        match self {
            Self::Uniform { low, high } => ParameterValue::Float(low + unit.clamp(0.0, 1.0) * (high - low)),
            Self::LogUniform { low, high } => {
                let log_lo = low.ln();
                let log_hi = high.ln();
                ParameterValue::Float((log_lo + unit.clamp(0.0, 1.0) * (log_hi - log_lo)).exp())
            }
            Self::DiscreteUniform { low, high, step } => {
                let raw = low + unit.clamp(0.0, 1.0) * (high - low);
                let steps = ((raw - low) / step).round();
                let snapped = (low + steps * step).clamp(*low, *high);
                ParameterValue::Float(snapped)
            }
            Self::Int { low, high } => {
                let lo = *low as f64 - 0.5;
                let hi = *high as f64 + 0.5;
                let raw = (lo + unit.clamp(0.0, 1.0) * (hi - lo)).round() as i64;
                ParameterValue::Int(raw.clamp(*low, *high))
            }
            Self::Categorical { choices } => {
                let k = choices.len();
                let idx = (unit.clamp(0.0, 0.999_999) * k as f64) as usize;
                ParameterValue::Categorical(choices[idx.min(k - 1)].clone())
            }
        }
    }

    /// Is this dimension continuous (participates in KDE / copula fitting as a real number)?
    pub fn is_continuous(&self) -> bool {
        !matches!(self, Self::Categorical { .. })
    }

    /// Floor-width in unit space used for the bandwidth floor.
    pub fn unit_width(&self) -> f64 {
        match self {
            Self::Uniform { .. }
            | Self::LogUniform { .. }
            | Self::DiscreteUniform { .. }
            | Self::Int { .. } => 1.0,
            Self::Categorical { .. } => 1.0,
        }
    }
}

/// A single named dimension of a search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
}

/// A concrete, static search space: an ordered list of parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Uniform { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    pub fn add_discrete_uniform(
        mut self,
        name: impl Into<String>,
        low: f64,
        high: f64,
        step: f64,
    ) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::DiscreteUniform { low, high, step },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Int { low, high },
        });
        self
    }

    pub fn add_categorical(mut self, name: impl Into<String>, choices: Vec<serde_json::Value>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Categorical { choices },
        });
        self
    }

    /// Validate every dimension's bounds.
    pub fn validate(&self) -> HpoResult<()> {
        for param in &self.parameters {
            param.kind.validate()?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Every sampled parameter mapping must satisfy its dimension's bounds.
    pub fn contains(&self, params: &ParamMap) -> bool {
        self.parameters.iter().all(|p| {
            params
                .get(&p.name)
                .map(|v| p.kind.contains(v))
                .unwrap_or(false)
        })
    }

    /// Total number of grid points, or `None` if any dimension is not grid-able.
    pub fn grid_size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for param in &self.parameters {
            let dim_size = match &param.kind {
                ParameterKind::Int { low, high } => (high - low + 1) as usize,
                ParameterKind::Categorical { choices } => choices.len(),
                _ => return None,
            };
            total = total.checked_mul(dim_size)?;
        }
        Some(total)
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// A search space that may depend on the trial index, permitting conditional
/// dimensions.
#[derive(Clone)]
pub enum DynamicSearchSpace {
    Static(SearchSpace),
    Dynamic(Arc<dyn Fn(usize) -> SearchSpace + Send + Sync>),
}

impl DynamicSearchSpace {
    pub fn resolve(&self, trial_index: usize) -> SearchSpace {
        match self {
            Self::Static(space) => space.clone(),
            Self::Dynamic(f) => f(trial_index),
        }
    }
}

impl std::fmt::Debug for DynamicSearchSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(space) => f.debug_tuple("Static").field(space).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<SearchSpace> for DynamicSearchSpace {
    fn from(space: SearchSpace) -> Self {
        Self::Static(space)
    }
}

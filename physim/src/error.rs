//! Error types for physim.
//!
//! Every error is fatal to the run that raised it. The driver wraps
//! failures that happen while stepping in [`SimError::StepFailed`] so the
//! caller sees the step index, the simulation time and the state that
//! produced the failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// A physical or numeric parameter is out of its allowed range
    #[error("invalid config `{field}`: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A derivative (or initial state) does not match the model dimension
    #[error("invalid state shape: expected {expected} values, found {found}")]
    InvalidStateShape { expected: usize, found: usize },

    /// NaN or infinity appeared in the state
    #[error("numeric divergence: state[{index}] = {value}")]
    NumericDivergence { index: usize, value: f64 },

    /// Fatal error raised while advancing the simulation
    #[error("step {step} (t = {time}) failed: {source}")]
    StepFailed {
        step: usize,
        time: f64,
        state: Vec<f64>,
        #[source]
        source: Box<SimError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SimError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SimError::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Innermost error, looking through `StepFailed` wrappers
    pub fn root(&self) -> &SimError {
        match self {
            SimError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

//! Error types.

use thiserror::Error;

/// Raised when a simulation config can't be loaded or holds an out-of-range value.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("can't read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("can't parse YAML from config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::OutOfRange {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field, if the error is about a single field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ConfigError::OutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Raised when a workload trace can't be loaded or used.
#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("can't read trace {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("trace has no sample for vm #{vm_id} at or before cycle {cycle}")]
    MissingSample { vm_id: u32, cycle: u32 },

    #[error("trace sample for vm #{vm_id} at cycle {cycle} is outside [0, 100]: {usage}")]
    InvalidSample { vm_id: u32, cycle: u32, usage: f64 },
}

//! Error Types
//!
//! Errors are split by phase:
//!
//! - [`ConfigError`]: loading and validating the run-configuration document
//! - [`BindError`]: non-fatal problems found while binding a step tree
//! - [`EngineError`]: structural misuse surfaced to the caller
//! - [`RemoteExecutionError`]: failures reported by the workload runner

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a configuration document.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Step type is not recognized: '{0}'")]
    UnknownStepType(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Working directory not found")]
    WorkingDirectoryNotFound,
}

/// Problems detected during a bind pass.
///
/// These never abort the bind: the offending composite is left with no
/// children and the error is recorded as a diagnostic on the bound plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Sequence '{name}' not found.")]
    SequenceNotFound { name: String },

    #[error("Circular reference to this step: '{name}' (depth {depth}).")]
    CircularReference { name: String, depth: usize },
}

/// Errors surfaced to the caller of the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Run configuration '{0}' not found.")]
    ConfigurationNotFound(String),

    #[error("Worker running step '{0}' panicked")]
    WorkerPanicked(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure reported by the workload runner for a single invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Remote execution of '{target}' failed: {message}")]
pub struct RemoteExecutionError {
    pub target: String,
    pub message: String,
}

impl RemoteExecutionError {
    pub fn new(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = BindError::SequenceNotFound {
            name: "Exports".to_string(),
        };
        assert_eq!(err.to_string(), "Sequence 'Exports' not found.");

        let err = BindError::CircularReference {
            name: "Loop".to_string(),
            depth: 3,
        };
        assert!(err.to_string().contains("Circular reference"));
        assert!(err.to_string().contains("Loop"));
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::ConfigurationNotFound("Nightly".to_string());
        assert_eq!(err.to_string(), "Run configuration 'Nightly' not found.");

        let err = EngineError::UnsupportedOperation("bare sequence".to_string());
        assert!(err.to_string().starts_with("Unsupported operation"));
    }

    #[test]
    fn test_config_error_from_yaml() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("not: [valid").unwrap_err();
        let err: ConfigError = yaml_err.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_remote_execution_error() {
        let err = RemoteExecutionError::new("HR", "exit code 2");
        assert_eq!(err.target, "HR");
        assert!(err.to_string().contains("exit code 2"));
    }
}

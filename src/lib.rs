//! Sequencer - Configuration-Driven Step Execution Engine
//!
//! Runs trees of management-agent invocations, delays and nested linear or
//! parallel sequences described in a YAML run-configuration document.
//!
//! # Architecture
//!
//! The library is organized into five modules:
//!
//! - [`configuration`]: Step definitions, sequence catalog and document loading
//! - [`execution`]: Bind and run phases, workload runners, the engine
//! - [`environment`]: Working-directory lookup
//! - [`monitoring`]: Execution timeline
//! - [`error`]: Error types for every phase
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sequencer::execution::{CommandRunner, Engine};
//! use sequencer::load_config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("run_configuration.yaml")?;
//!     let runner = CommandRunner::new(config.agent.clone().unwrap_or_default());
//!
//!     let engine = Engine::new(config, Arc::new(runner));
//!     let report = engine.run_configuration("Default")?;
//!     println!("{} failed steps", report.failures());
//!     Ok(())
//! }
//! ```

pub mod configuration;
pub mod environment;
pub mod error;
pub mod execution;
pub mod monitoring;

// Re-export commonly used types
pub use configuration::{load_config, SchedulerConfig, StepDefinition, StepKind};
pub use error::{BindError, ConfigError, EngineError, RemoteExecutionError};
pub use execution::{Engine, RunReport, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Sequencer";

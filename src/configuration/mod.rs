//! Run Configuration Module
//!
//! Data structures and loading for run-configuration documents.
//!
//! # Structure
//!
//! - [`model`]: Step definitions, sequence catalog, global parameters
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Name, delay and reference checks

pub mod model;
pub mod parser;
pub mod validator;

pub use model::{
    AgentCommand, Catalog, NamedMap, Parameters, RunConfigurationDefinition, SchedulerConfig,
    SequenceDefinition, StepDefinition, StepKind,
};
pub use parser::{load_config, parse_config, RUN_CONFIG_FILE};
pub use validator::{cyclic_sequences, quick_validate};

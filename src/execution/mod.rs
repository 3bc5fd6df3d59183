//! Execution Module
//!
//! Turns a run configuration into a bound step tree and runs it.
//!
//! # Architecture
//!
//! - [`binder`]: Bind phase, reference resolution and cycle breaking
//! - [`step`]: Step tree, leaf steps and the run phase
//! - [`sequence`]: Linear, parallel and bare composites
//! - [`agent`]: Workload runners invoked by leaf steps
//! - [`engine`]: Run-configuration selection, locking and housekeeping

pub mod agent;
pub mod binder;
pub mod engine;
pub mod sequence;
pub mod step;

pub use agent::{CommandRunner, DryRunRunner, WorkloadRunner};
pub use binder::{bind_run_configuration, BindContext, BoundPlan, PlanDescription};
pub use engine::{Engine, RunReport};
pub use sequence::{Resolution, Sequence};
pub use step::{PlanNode, RunContext, Step};

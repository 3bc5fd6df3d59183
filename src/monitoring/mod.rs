//! Run Monitoring Module
//!
//! Records what happened during a run.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/end timing for summaries and Gantt charts

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, StepSpan, TimelineEvent};

//! Composite Steps
//!
//! [`Sequence`] is the resolution behaviour shared by linear and parallel
//! composites: it looks its name up in the catalog and instantiates the
//! declared steps as children. How the children run depends on the variant
//! holding it:
//!
//! - linear: one after another, pausing `delay_in_linear_sequence` between
//!   children
//! - parallel: one scoped thread per child, launches staggered by
//!   `delay_in_parallel_sequence`, then a join barrier
//! - bare sequence: cannot run at all

use std::thread;

use log::{debug, error, info, warn};
use serde::Serialize;

use super::binder::{effective_profile, BindContext};
use super::step::{RunContext, Step};
use crate::configuration::StepDefinition;
use crate::error::{BindError, EngineError};
use crate::monitoring::EventType;

/// Outcome of resolving a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Not bound yet
    Unbound,
    /// Children instantiated from the catalog
    Resolved,
    /// Name absent from the catalog; no children
    NotFound,
    /// Re-entered during the same bind pass; children dropped
    CircularReference,
}

/// A composite node: a named reference into the catalog plus the children
/// resolved for it.
#[derive(Debug, Clone)]
pub struct Sequence {
    pub(crate) name: String,
    pub(crate) action: Option<String>,
    pub(crate) profile: Option<String>,
    pub(crate) resolution: Resolution,
    pub(crate) children: Vec<Step>,
    // Entry points carry their own steps instead of a catalog reference
    inline: Option<Vec<StepDefinition>>,
}

impl Sequence {
    /// Creates an unbound reference to a catalog sequence.
    pub fn new(name: impl Into<String>, action: Option<String>) -> Self {
        Self {
            name: name.into(),
            action,
            profile: None,
            resolution: Resolution::Unbound,
            children: Vec::new(),
            inline: None,
        }
    }

    /// Creates an entry point whose children are declared inline.
    pub(crate) fn inline(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            inline: Some(steps),
            ..Self::new(name, None)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Step] {
        &self.children
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn is_bound(&self) -> bool {
        self.resolution != Resolution::Unbound
    }

    /// Resolves children and binds each one beneath this node.
    pub(crate) fn bind(&mut self, ctx: &mut BindContext<'_>, inherited: &str, depth: usize) {
        let profile = effective_profile(self.action.as_deref(), inherited);
        self.profile = Some(profile.clone());
        self.children.clear();

        if let Some(steps) = &self.inline {
            self.children = steps.iter().map(Step::from_definition).collect();
            for child in &mut self.children {
                child.bind(ctx, &profile, depth + 1);
            }
            self.resolution = Resolution::Resolved;
            return;
        }

        if ctx.is_active(&self.name) {
            error!("Circular reference to this step: '{}'.", self.name);
            self.resolution = Resolution::CircularReference;
            ctx.report(BindError::CircularReference {
                name: self.name.clone(),
                depth,
            });
            return;
        }

        let Some(definition) = ctx.catalog().get(&self.name) else {
            error!("Sequence '{}' not found.", self.name);
            self.resolution = Resolution::NotFound;
            ctx.report(BindError::SequenceNotFound {
                name: self.name.clone(),
            });
            return;
        };

        debug!(
            "Resolving sequence '{}' ({} steps, profile '{}', depth {})",
            self.name,
            definition.steps.len(),
            profile,
            depth
        );

        ctx.enter(&self.name);
        self.children = definition.steps.iter().map(Step::from_definition).collect();
        for child in &mut self.children {
            child.bind(ctx, &profile, depth + 1);
        }
        ctx.leave();

        self.resolution = Resolution::Resolved;
    }

    /// Runs children in declared order with the linear delay between them.
    pub(crate) fn run_linear(&self, ctx: &RunContext<'_>) -> Result<(), EngineError> {
        if !self.is_bound() {
            warn!("Linear sequence '{}' was never bound, nothing to run", self.name);
            return Ok(());
        }

        let delay = ctx.parameters.linear_delay();
        let last = self.children.len().saturating_sub(1);

        for (index, child) in self.children.iter().enumerate() {
            child.run(ctx)?;

            if index < last && !delay.is_zero() {
                debug!("Waiting {:?} before next step of '{}'", delay, self.name);
                thread::sleep(delay);
            }
        }

        Ok(())
    }

    /// Runs every child on its own thread and waits for all of them.
    ///
    /// Threads are started in declared order with the parallel delay between
    /// launches. Every launched thread is joined before returning, even when
    /// a sibling failed; the first failure is then returned.
    pub(crate) fn run_parallel(&self, ctx: &RunContext<'_>) -> Result<(), EngineError> {
        if !self.is_bound() {
            let msg = format!(
                "ParallelSequence '{}' does not support run without being bound first.",
                self.name
            );
            error!("{}", msg);
            return Err(EngineError::UnsupportedOperation(msg));
        }

        let delay = ctx.parameters.parallel_delay();

        let results: Vec<Result<(), EngineError>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.children.len());

            for (index, child) in self.children.iter().enumerate() {
                if index > 0 && !delay.is_zero() {
                    thread::sleep(delay);
                }
                debug!(
                    "Launching '{}' ({}/{}) of parallel sequence '{}'",
                    child.name(),
                    index + 1,
                    self.children.len(),
                    self.name
                );
                handles.push((child.name(), scope.spawn(move || child.run(ctx))));
            }

            handles
                .into_iter()
                .map(|(name, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        error!("Worker running '{}' panicked", name);
                        Err(EngineError::WorkerPanicked(name.to_string()))
                    })
                })
                .collect()
        });

        info!(
            "Parallel sequence '{}' joined {} steps",
            self.name,
            results.len()
        );

        results.into_iter().collect()
    }

    /// A bare sequence is only a resolver.
    pub(crate) fn run_bare(&self) -> Result<(), EngineError> {
        let msg = format!(
            "Sequence '{}' does not support run operation. Use LinearSequence or ParallelSequence instead.",
            self.name
        );
        error!("{}", msg);
        Err(EngineError::UnsupportedOperation(msg))
    }

    pub(crate) fn record(&self, ctx: &RunContext<'_>, event: EventType) {
        ctx.timeline.add_event(self.name.clone(), event);
    }
}

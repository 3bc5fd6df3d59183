//! Step Tree
//!
//! A [`Step`] is one node of a bound execution tree. Leaves do work
//! ([`ManagementAgent`], [`Delay`]); composites hold children resolved from
//! the catalog (see [`super::sequence`]).
//!
//! Every step goes through two phases:
//! 1. `bind`: compute the effective run profile and resolve children
//! 2. `run`: perform the work, only after the whole tree is bound

use std::thread;
use std::time::Duration;

use log::{debug, error, info};
use serde::Serialize;

use super::agent::WorkloadRunner;
use super::binder::{effective_profile, BindContext};
use super::sequence::{Resolution, Sequence};
use crate::configuration::{Catalog, Parameters, RunConfigurationDefinition, StepDefinition, StepKind};
use crate::error::{BindError, EngineError};
use crate::monitoring::{EventType, ExecutionTimeline};

/// Shared, read-only state every step of a run can reach.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    pub runner: &'a dyn WorkloadRunner,
    pub parameters: &'a Parameters,
    pub timeline: &'a ExecutionTimeline,
}

impl<'a> RunContext<'a> {
    pub fn new(
        runner: &'a dyn WorkloadRunner,
        parameters: &'a Parameters,
        timeline: &'a ExecutionTimeline,
    ) -> Self {
        Self {
            runner,
            parameters,
            timeline,
        }
    }
}

/// Leaf that runs one profile of a management agent.
#[derive(Debug, Clone)]
pub struct ManagementAgent {
    name: String,
    action: Option<String>,
    profile: Option<String>,
}

impl ManagementAgent {
    fn run(&self, ctx: &RunContext<'_>) {
        let Some(profile) = self.profile.as_deref() else {
            error!("Management agent '{}' was never bound, skipping.", self.name);
            ctx.timeline.add_event(self.name.clone(), EventType::Failed);
            return;
        };

        ctx.timeline.add_event(self.name.clone(), EventType::Started);
        info!("Management agent '{}' started.", self.name);

        match ctx.runner.execute(&self.name, profile) {
            Ok(status) => {
                info!(
                    "Management agent '{}' finished '{}' with status '{}'.",
                    self.name, profile, status
                );
                ctx.timeline.add_event(self.name.clone(), EventType::Completed);
            }
            Err(e) => {
                error!("Error occurred during management agent run: {}", e);
                ctx.timeline.add_event(self.name.clone(), EventType::Failed);
            }
        }
    }
}

/// Leaf that only waits.
#[derive(Debug, Clone)]
pub struct Delay {
    name: String,
    seconds: f64,
    duration: Duration,
    profile: Option<String>,
}

impl Delay {
    fn run(&self) {
        debug!("Delay '{}' sleeping {:?}", self.name, self.duration);
        thread::sleep(self.duration);
    }
}

/// A node of the execution tree.
#[derive(Debug, Clone)]
pub enum Step {
    ManagementAgent(ManagementAgent),
    Delay(Delay),
    LinearSequence(Sequence),
    ParallelSequence(Sequence),
    /// Resolution-only reference; cannot run
    Sequence(Sequence),
}

impl Step {
    /// Instantiates an unbound step from its definition.
    pub fn from_definition(definition: &StepDefinition) -> Self {
        let name = definition.name.clone();
        let action = definition.action.clone();

        match definition.kind {
            StepKind::ManagementAgent => Self::ManagementAgent(ManagementAgent {
                name,
                action,
                profile: None,
            }),
            StepKind::Delay => Self::Delay(Delay {
                name,
                seconds: definition.seconds,
                duration: definition.duration(),
                profile: None,
            }),
            StepKind::LinearSequence => Self::LinearSequence(Sequence::new(name, action)),
            StepKind::ParallelSequence => Self::ParallelSequence(Sequence::new(name, action)),
        }
    }

    /// Creates an unbound bare sequence reference.
    pub fn sequence(name: impl Into<String>) -> Self {
        Self::Sequence(Sequence::new(name, None))
    }

    /// Creates the entry point of a run configuration.
    pub fn entry(definition: &RunConfigurationDefinition) -> Self {
        Self::LinearSequence(Sequence::inline(
            definition.name.clone(),
            definition.steps.clone(),
        ))
    }

    pub fn name(&self) -> &str {
        match self {
            Self::ManagementAgent(agent) => &agent.name,
            Self::Delay(delay) => &delay.name,
            Self::LinearSequence(seq) | Self::ParallelSequence(seq) | Self::Sequence(seq) => {
                seq.name()
            }
        }
    }

    /// Tag of this step's type.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ManagementAgent(_) => StepKind::ManagementAgent.as_str(),
            Self::Delay(_) => StepKind::Delay.as_str(),
            Self::LinearSequence(_) => StepKind::LinearSequence.as_str(),
            Self::ParallelSequence(_) => StepKind::ParallelSequence.as_str(),
            Self::Sequence(_) => "Sequence",
        }
    }

    /// Effective run profile, known once bound.
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::ManagementAgent(agent) => agent.profile.as_deref(),
            Self::Delay(delay) => delay.profile.as_deref(),
            Self::LinearSequence(seq) | Self::ParallelSequence(seq) | Self::Sequence(seq) => {
                seq.profile.as_deref()
            }
        }
    }

    /// Resolved children; always empty for leaves.
    pub fn children(&self) -> &[Step] {
        match self {
            Self::LinearSequence(seq) | Self::ParallelSequence(seq) | Self::Sequence(seq) => {
                seq.children()
            }
            _ => &[],
        }
    }

    /// Catalog resolution outcome; `None` for leaves.
    pub fn resolution(&self) -> Option<Resolution> {
        match self {
            Self::LinearSequence(seq) | Self::ParallelSequence(seq) | Self::Sequence(seq) => {
                Some(seq.resolution())
            }
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        match self {
            Self::LinearSequence(seq) | Self::ParallelSequence(seq) | Self::Sequence(seq) => {
                seq.is_bound()
            }
            _ => self.profile().is_some(),
        }
    }

    /// Bind phase for this node and everything beneath it.
    pub fn bind(&mut self, ctx: &mut BindContext<'_>, inherited: &str, depth: usize) {
        match self {
            Self::ManagementAgent(agent) => {
                agent.profile = Some(effective_profile(agent.action.as_deref(), inherited));
            }
            Self::Delay(delay) => {
                delay.profile = Some(inherited.to_string());
            }
            Self::LinearSequence(seq) | Self::ParallelSequence(seq) | Self::Sequence(seq) => {
                seq.bind(ctx, inherited, depth);
            }
        }
    }

    /// Runs a complete bind pass rooted at this step.
    pub fn bind_with(&mut self, catalog: &Catalog, inherited: &str) -> Vec<BindError> {
        let mut ctx = BindContext::new(catalog);
        self.bind(&mut ctx, inherited, 0);
        ctx.into_diagnostics()
    }

    /// Run phase.
    ///
    /// Workload failures are handled inside the leaf; only structural misuse
    /// (running a bare sequence or an unbound parallel sequence) is returned.
    pub fn run(&self, ctx: &RunContext<'_>) -> Result<(), EngineError> {
        match self {
            Self::ManagementAgent(agent) => {
                agent.run(ctx);
                Ok(())
            }
            Self::Delay(delay) => {
                delay.run();
                Ok(())
            }
            Self::LinearSequence(seq) => run_composite(seq, ctx, Sequence::run_linear),
            Self::ParallelSequence(seq) => run_composite(seq, ctx, Sequence::run_parallel),
            Self::Sequence(seq) => seq.run_bare(),
        }
    }

    /// Serializable view of this subtree.
    pub fn describe(&self) -> PlanNode {
        let seconds = match self {
            Self::Delay(delay) => Some(delay.seconds),
            _ => None,
        };

        PlanNode {
            kind: self.kind_name(),
            name: self.name().to_string(),
            profile: self.profile().map(str::to_string),
            seconds,
            resolution: self.resolution(),
            children: self.children().iter().map(Step::describe).collect(),
        }
    }
}

fn run_composite(
    seq: &Sequence,
    ctx: &RunContext<'_>,
    body: fn(&Sequence, &RunContext<'_>) -> Result<(), EngineError>,
) -> Result<(), EngineError> {
    seq.record(ctx, EventType::Started);
    let result = body(seq, ctx);
    seq.record(
        ctx,
        if result.is_ok() {
            EventType::Completed
        } else {
            EventType::Failed
        },
    );
    result
}

/// Bound tree node as shown by `--plan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanNode {
    pub kind: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    /// Number of management agent invocations this plan would make.
    pub fn agent_count(&self) -> usize {
        let own = usize::from(self.kind == StepKind::ManagementAgent.as_str());
        own + self.children.iter().map(PlanNode::agent_count).sum::<usize>()
    }
}

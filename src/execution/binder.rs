//! Bind Phase
//!
//! Resolves sequence references into concrete child steps, computes the
//! effective run profile of every node and breaks circular references.
//!
//! A bind pass is single-threaded and depth-first. Cycle detection keeps the
//! names of the composites currently being resolved on an explicit path that
//! lives only as long as the pass itself; definitions are never mutated.

use log::{debug, info};
use serde::Serialize;

use super::step::{PlanNode, Step};
use crate::configuration::{Catalog, RunConfigurationDefinition};
use crate::error::BindError;

/// State threaded through one bind pass.
#[derive(Debug)]
pub struct BindContext<'a> {
    catalog: &'a Catalog,
    active: Vec<String>,
    diagnostics: Vec<BindError>,
}

impl<'a> BindContext<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            active: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Returns true if `name` is already being resolved higher up the path.
    pub fn is_active(&self, name: &str) -> bool {
        let key = name.trim().to_lowercase();
        self.active.iter().any(|n| *n == key)
    }

    /// Marks a sequence as being resolved.
    pub fn enter(&mut self, name: &str) {
        self.active.push(name.trim().to_lowercase());
    }

    /// Leaves the most recently entered sequence.
    pub fn leave(&mut self) {
        self.active.pop();
    }

    /// Records a non-fatal bind problem.
    pub fn report(&mut self, error: BindError) {
        self.diagnostics.push(error);
    }

    pub fn into_diagnostics(self) -> Vec<BindError> {
        self.diagnostics
    }
}

/// Effective run profile: the step's own action wins over the inherited one.
pub fn effective_profile(action: Option<&str>, inherited: &str) -> String {
    match action {
        Some(action) if !action.trim().is_empty() => action.to_string(),
        _ => inherited.to_string(),
    }
}

/// A fully bound run configuration, ready to run.
#[derive(Debug)]
pub struct BoundPlan {
    /// Entry point: a linear sequence holding the configuration's steps
    pub root: Step,
    /// Problems found while binding, in the order they were found
    pub diagnostics: Vec<BindError>,
}

impl BoundPlan {
    /// Serializable view of the bound tree and its diagnostics.
    pub fn describe(&self) -> PlanDescription {
        PlanDescription {
            plan: self.root.describe(),
            diagnostics: self.diagnostics.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Output of `--plan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDescription {
    pub plan: PlanNode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

/// Binds a run configuration against the catalog.
///
/// The entry point inherits nothing: its own default profile seeds the
/// pass at depth 0, and every inline step is bound beneath it.
pub fn bind_run_configuration(
    definition: &RunConfigurationDefinition,
    catalog: &Catalog,
) -> BoundPlan {
    info!(
        "Binding run configuration '{}' with profile '{}'",
        definition.name, definition.profile
    );

    let mut ctx = BindContext::new(catalog);
    let mut root = Step::entry(definition);
    root.bind(&mut ctx, &definition.profile, 0);

    let diagnostics = ctx.into_diagnostics();
    debug!(
        "Bound '{}' with {} diagnostics",
        definition.name,
        diagnostics.len()
    );

    BoundPlan { root, diagnostics }
}

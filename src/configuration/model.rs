//! Configuration Data Model
//!
//! Step definitions, the sequence catalog and run configurations as they
//! exist after loading. Definitions are immutable; bound step instances are
//! created from them for every run (see [`crate::execution::step`]).
//!
//! # Example YAML Format
//!
//! ```yaml
//! parameters:
//!   delay_in_linear_sequence: 1
//!   delay_in_parallel_sequence: 2
//!   on_demand_schedule: Default
//!
//! sequences:
//!   - name: Imports
//!     steps:
//!       - type: ManagementAgent
//!         name: HR
//!         action: Full Import
//!       - type: Delay
//!         seconds: 5
//!       - type: ParallelSequence
//!         name: Exports
//!
//! run_configurations:
//!   - name: Default
//!     profile: Delta Import
//!     steps:
//!       - type: LinearSequence
//!         name: Imports
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Lookup table from the `type` tag used in documents to the step kind.
static STEP_KINDS: Lazy<HashMap<&'static str, StepKind>> = Lazy::new(|| {
    [
        StepKind::ManagementAgent,
        StepKind::Delay,
        StepKind::LinearSequence,
        StepKind::ParallelSequence,
    ]
    .into_iter()
    .map(|kind| (kind.as_str(), kind))
    .collect()
});

/// The closed set of step types a document may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepKind {
    /// Triggers one run of a named management agent
    ManagementAgent,
    /// Waits for a number of seconds
    Delay,
    /// Runs a catalog sequence child after child
    LinearSequence,
    /// Runs a catalog sequence with one thread per child
    ParallelSequence,
}

impl StepKind {
    /// Resolves a document tag such as `"ParallelSequence"`.
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        STEP_KINDS
            .get(tag.trim())
            .copied()
            .ok_or_else(|| ConfigError::UnknownStepType(tag.to_string()))
    }

    /// Returns the tag used for this kind in documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagementAgent => "ManagementAgent",
            Self::Delay => "Delay",
            Self::LinearSequence => "LinearSequence",
            Self::ParallelSequence => "ParallelSequence",
        }
    }

    /// Returns true for kinds that resolve children from the catalog.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::LinearSequence | Self::ParallelSequence)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Global parameters shared read-only by every step of a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Parameters {
    /// Clear the synchronization run history after each run
    pub clear_run_history: bool,

    /// Number of days of run history to keep when clearing
    pub keep_history_days: u32,

    /// Seconds between one child finishing and the next starting
    pub delay_in_linear_sequence: f64,

    /// Seconds between launching consecutive parallel children
    pub delay_in_parallel_sequence: f64,

    /// Run configuration used for on-demand runs
    pub on_demand_schedule: String,
}

impl Parameters {
    /// Pause inserted between children of a linear sequence.
    pub fn linear_delay(&self) -> Duration {
        seconds_to_duration(self.delay_in_linear_sequence)
    }

    /// Stagger between thread launches of a parallel sequence.
    pub fn parallel_delay(&self) -> Duration {
        seconds_to_duration(self.delay_in_parallel_sequence)
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            clear_run_history: false,
            keep_history_days: 0,
            delay_in_linear_sequence: 0.0,
            delay_in_parallel_sequence: 0.0,
            on_demand_schedule: String::new(),
        }
    }
}

/// Command templates used by the command-backed workload runner.
///
/// `{agent}` and `{profile}` are substituted in `run`, `{before}` in
/// `clear_runs`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AgentCommand {
    pub run: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_runs: Option<Vec<String>>,
}

/// Definition of a single step as declared in a sequence or run configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDefinition {
    pub kind: StepKind,

    /// Agent name for leaves, catalog key for composites
    pub name: String,

    /// Run profile override for this step and everything beneath it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Wait time, only meaningful for delays
    pub seconds: f64,
}

impl StepDefinition {
    fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into().trim().to_string(),
            action: None,
            seconds: 0.0,
        }
    }

    /// Creates a management agent step.
    ///
    /// # Example
    ///
    /// ```
    /// use sequencer::configuration::StepDefinition;
    ///
    /// let step = StepDefinition::agent("HR").with_action("Full Import");
    /// assert_eq!(step.action.as_deref(), Some("Full Import"));
    /// ```
    pub fn agent(name: impl Into<String>) -> Self {
        Self::new(StepKind::ManagementAgent, name)
    }

    /// Creates a delay step.
    pub fn delay(seconds: f64) -> Self {
        let mut step = Self::new(StepKind::Delay, "Delay");
        step.seconds = seconds;
        step
    }

    /// Creates a reference to a catalog sequence run linearly.
    pub fn linear(name: impl Into<String>) -> Self {
        Self::new(StepKind::LinearSequence, name)
    }

    /// Creates a reference to a catalog sequence run in parallel.
    pub fn parallel(name: impl Into<String>) -> Self {
        Self::new(StepKind::ParallelSequence, name)
    }

    /// Sets the run profile override.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        let action = action.into();
        self.action = if action.trim().is_empty() {
            None
        } else {
            Some(action)
        };
        self
    }

    /// Wait time of a delay step.
    pub fn duration(&self) -> Duration {
        seconds_to_duration(self.seconds)
    }
}

/// A named group of steps in the sequence catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl SequenceDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            steps,
        }
    }
}

/// A top-level entry point: a linear sequence with its own default profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfigurationDefinition {
    pub name: String,
    pub profile: String,
    pub steps: Vec<StepDefinition>,
}

impl RunConfigurationDefinition {
    pub fn new(
        name: impl Into<String>,
        profile: impl Into<String>,
        steps: Vec<StepDefinition>,
    ) -> Self {
        Self {
            name: name.into().trim().to_string(),
            profile: profile.into(),
            steps,
        }
    }
}

/// Case-insensitive name lookup shared by the catalog and the run
/// configuration table.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMap<T> {
    entries: BTreeMap<String, T>,
}

impl<T> NamedMap<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Inserts an entry, refusing duplicates that differ only by case.
    pub fn insert(&mut self, name: &str, value: T) -> Result<(), ConfigError> {
        let key = Self::key(name);
        if self.entries.contains_key(&key) {
            return Err(ConfigError::Invalid(format!("Duplicate name: '{}'", name)));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.get(&Self::key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&Self::key(name))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for NamedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequence name to declared step list.
pub type Catalog = NamedMap<SequenceDefinition>;

impl Catalog {
    /// Builds a catalog from a list of sequences.
    pub fn from_sequences(sequences: Vec<SequenceDefinition>) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        for sequence in sequences {
            let name = sequence.name.clone();
            catalog.insert(&name, sequence)?;
        }
        Ok(catalog)
    }
}

/// Everything loaded from one configuration document.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub parameters: Parameters,
    pub agent: Option<AgentCommand>,
    pub catalog: Catalog,
    pub run_configurations: NamedMap<RunConfigurationDefinition>,
}

impl SchedulerConfig {
    /// Looks up a run configuration, ignoring case.
    pub fn run_configuration(&self, name: &str) -> Option<&RunConfigurationDefinition> {
        self.run_configurations.get(name)
    }
}

/// Converts a delay in seconds, or `None` if it is negative, NaN or too
/// large for a `Duration`.
pub(crate) fn try_seconds_to_duration(seconds: f64) -> Option<Duration> {
    if seconds < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

// Unrepresentable values are rejected by validation; zero otherwise.
fn seconds_to_duration(seconds: f64) -> Duration {
    try_seconds_to_duration(seconds).unwrap_or(Duration::ZERO)
}

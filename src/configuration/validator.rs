//! Configuration Validation
//!
//! Checks definitions after parsing:
//! - Names are present and unique (case-insensitive)
//! - Delays are non-negative and fit in a `Duration`
//! - Sequence references resolve (warning only)
//! - Catalog sequences do not reference each other in a loop (warning only)
//!
//! Unresolved references and cycles are not fatal: the engine binds them
//! into no-op nodes at run time and logs the problem there as well.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use log::{debug, info, warn};

use super::model::{
    try_seconds_to_duration, Parameters, RunConfigurationDefinition, SchedulerConfig,
    SequenceDefinition, StepDefinition, StepKind,
};
use crate::error::ConfigError;

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptySequenceName,
    EmptyRunConfigurationName,
    DuplicateSequence(String),
    DuplicateRunConfiguration(String),
    EmptyStepName { owner: String, kind: StepKind },
    InvalidDelay { owner: String, seconds: f64 },
    InvalidParameter { name: &'static str, value: f64 },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySequenceName => write!(f, "A sequence has an empty name"),
            Self::EmptyRunConfigurationName => {
                write!(f, "A run configuration has an empty name")
            }
            Self::DuplicateSequence(name) => write!(f, "Duplicate sequence name: '{}'", name),
            Self::DuplicateRunConfiguration(name) => {
                write!(f, "Duplicate run configuration name: '{}'", name)
            }
            Self::EmptyStepName { owner, kind } => {
                write!(f, "'{}': {} step has no name", owner, kind)
            }
            Self::InvalidDelay { owner, seconds } => {
                write!(f, "'{}': delay of {} seconds is not valid", owner, seconds)
            }
            Self::InvalidParameter { name, value } => {
                write!(f, "Parameter '{}' has invalid value {}", name, value)
            }
        }
    }
}

fn valid_seconds(seconds: f64) -> bool {
    try_seconds_to_duration(seconds).is_some()
}

/// Validates the steps of one sequence or run configuration.
fn validate_steps(owner: &str, steps: &[StepDefinition]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for step in steps {
        match step.kind {
            StepKind::Delay => {
                if !valid_seconds(step.seconds) {
                    errors.push(ValidationError::InvalidDelay {
                        owner: owner.to_string(),
                        seconds: step.seconds,
                    });
                }
            }
            kind => {
                if step.name.trim().is_empty() {
                    errors.push(ValidationError::EmptyStepName {
                        owner: owner.to_string(),
                        kind,
                    });
                }
            }
        }
    }

    errors
}

fn validate_parameters(parameters: &Parameters) -> Vec<ValidationError> {
    [
        ("delay_in_linear_sequence", parameters.delay_in_linear_sequence),
        (
            "delay_in_parallel_sequence",
            parameters.delay_in_parallel_sequence,
        ),
    ]
    .into_iter()
    .filter(|(_, value)| !valid_seconds(*value))
    .map(|(name, value)| ValidationError::InvalidParameter { name, value })
    .collect()
}

/// Validates parsed definitions before they are assembled into lookup tables.
///
/// Performs the following checks:
/// 1. Parameters hold valid delays
/// 2. Sequences and run configurations have non-empty, unique names
/// 3. Agent and composite steps have names, delays are valid
///
/// Reference problems are only logged as warnings.
pub fn validate_definitions(
    parameters: &Parameters,
    sequences: &[SequenceDefinition],
    run_configurations: &[RunConfigurationDefinition],
) -> Result<(), ConfigError> {
    info!(
        "Validating {} sequences and {} run configurations",
        sequences.len(),
        run_configurations.len()
    );

    let mut all_errors = validate_parameters(parameters);

    let mut seen: HashSet<String> = HashSet::new();
    for seq in sequences {
        if seq.name.is_empty() {
            all_errors.push(ValidationError::EmptySequenceName);
        } else if !seen.insert(seq.name.to_lowercase()) {
            all_errors.push(ValidationError::DuplicateSequence(seq.name.clone()));
        }
        all_errors.extend(validate_steps(&seq.name, &seq.steps));
    }

    let mut seen_rc: HashSet<String> = HashSet::new();
    for rc in run_configurations {
        if rc.name.is_empty() {
            all_errors.push(ValidationError::EmptyRunConfigurationName);
        } else if !seen_rc.insert(rc.name.to_lowercase()) {
            all_errors.push(ValidationError::DuplicateRunConfiguration(rc.name.clone()));
        }
        all_errors.extend(validate_steps(&rc.name, &rc.steps));
    }

    if !all_errors.is_empty() {
        let messages: Vec<String> = all_errors.iter().map(|e| e.to_string()).collect();
        return Err(ConfigError::Invalid(messages.join("\n")));
    }

    for warning in collect_warnings(parameters, sequences, run_configurations, &seen) {
        warn!("{}", warning);
    }

    debug!("Configuration definitions validated");
    Ok(())
}

fn collect_warnings(
    parameters: &Parameters,
    sequences: &[SequenceDefinition],
    run_configurations: &[RunConfigurationDefinition],
    sequence_names: &HashSet<String>,
) -> Vec<String> {
    let mut warnings = Vec::new();

    let owners = sequences
        .iter()
        .map(|s| (&s.name, &s.steps))
        .chain(run_configurations.iter().map(|rc| (&rc.name, &rc.steps)));

    for (owner, steps) in owners {
        for step in steps.iter().filter(|s| s.kind.is_composite()) {
            if !sequence_names.contains(&step.name.to_lowercase()) {
                warnings.push(format!(
                    "'{}': references unknown sequence '{}'",
                    owner, step.name
                ));
            }
        }
    }

    for rc in run_configurations {
        if rc.profile.trim().is_empty() {
            warnings.push(format!("Run configuration '{}' has no profile", rc.name));
        }
    }

    let cyclic = cyclic_sequences(sequences);
    if !cyclic.is_empty() {
        warnings.push(format!(
            "Circular sequence references involving: {}",
            cyclic.join(", ")
        ));
    }

    let on_demand = parameters.on_demand_schedule.trim();
    if !on_demand.is_empty()
        && !run_configurations
            .iter()
            .any(|rc| rc.name.eq_ignore_ascii_case(on_demand))
    {
        warnings.push(format!(
            "On-demand schedule '{}' is not a known run configuration",
            on_demand
        ));
    }

    warnings
}

/// Returns the names of catalog sequences that can reach themselves.
///
/// Kahn's algorithm first strips every sequence that cannot be on a cycle;
/// the remaining ones are checked for self-reachability.
pub fn cyclic_sequences(sequences: &[SequenceDefinition]) -> Vec<String> {
    let display: BTreeMap<String, &str> = sequences
        .iter()
        .map(|s| (s.name.to_lowercase(), s.name.as_str()))
        .collect();

    // Edges: sequence -> sequences it references
    let edges: BTreeMap<String, BTreeSet<String>> = sequences
        .iter()
        .map(|s| {
            let targets = s
                .steps
                .iter()
                .filter(|step| step.kind.is_composite())
                .map(|step| step.name.to_lowercase())
                .filter(|name| display.contains_key(name))
                .collect();
            (s.name.to_lowercase(), targets)
        })
        .collect();

    let mut in_degree: BTreeMap<&str, usize> = edges.keys().map(|k| (k.as_str(), 0)).collect();
    for targets in edges.values() {
        for target in targets {
            if let Some(degree) = in_degree.get_mut(target.as_str()) {
                *degree += 1;
            }
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(k, _)| *k)
        .collect();
    let mut removed: HashSet<&str> = HashSet::new();

    while let Some(current) = queue.pop_front() {
        removed.insert(current);
        if let Some(targets) = edges.get(current) {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(target.as_str());
                    }
                }
            }
        }
    }

    let mut cyclic: Vec<String> = edges
        .keys()
        .filter(|name| !removed.contains(name.as_str()))
        .filter(|name| reaches(&edges, name, name))
        .filter_map(|name| display.get(name).map(|d| d.to_string()))
        .collect();
    cyclic.sort();
    cyclic
}

fn reaches(edges: &BTreeMap<String, BTreeSet<String>>, from: &str, target: &str) -> bool {
    let mut stack: Vec<&str> = edges
        .get(from)
        .map(|t| t.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let mut visited: HashSet<&str> = HashSet::new();

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if visited.insert(node) {
            if let Some(next) = edges.get(node) {
                stack.extend(next.iter().map(String::as_str));
            }
        }
    }

    false
}

/// Quick validation that returns a list of human-readable problems.
///
/// Useful for `--check` feedback on an already loaded configuration.
pub fn quick_validate(config: &SchedulerConfig) -> Vec<String> {
    let sequences: Vec<SequenceDefinition> = config.catalog.values().cloned().collect();
    let run_configurations: Vec<RunConfigurationDefinition> =
        config.run_configurations.values().cloned().collect();
    let names: HashSet<String> = sequences.iter().map(|s| s.name.to_lowercase()).collect();

    let mut problems: Vec<String> = validate_parameters(&config.parameters)
        .iter()
        .map(|e| e.to_string())
        .collect();

    if run_configurations.is_empty() {
        problems.push("Configuration has no run configurations".to_string());
    }

    problems.extend(collect_warnings(
        &config.parameters,
        &sequences,
        &run_configurations,
        &names,
    ));
    problems
}

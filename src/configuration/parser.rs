//! Configuration Parser
//!
//! Loads run-configuration documents from YAML. Raw serde structures are
//! converted into typed definitions (resolving step type tags), validated,
//! and assembled into a [`SchedulerConfig`].

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info, trace};
use serde::Deserialize;

use super::model::{
    AgentCommand, Catalog, NamedMap, Parameters, RunConfigurationDefinition, SchedulerConfig,
    SequenceDefinition, StepDefinition, StepKind,
};
use super::validator::validate_definitions;
use crate::error::ConfigError;

/// Default name of the configuration document inside the working directory.
pub const RUN_CONFIG_FILE: &str = "run_configuration.yaml";

#[derive(Deserialize, Debug)]
struct RawConfig {
    #[serde(default)]
    parameters: Parameters,

    #[serde(default)]
    agent: Option<AgentCommand>,

    #[serde(default)]
    sequences: Vec<RawSequence>,

    #[serde(default)]
    run_configurations: Vec<RawRunConfiguration>,
}

#[derive(Deserialize, Debug)]
struct RawSequence {
    name: String,

    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Deserialize, Debug)]
struct RawRunConfiguration {
    name: String,

    #[serde(default)]
    profile: String,

    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Deserialize, Debug)]
struct RawStep {
    #[serde(rename = "type")]
    step_type: String,

    #[serde(default)]
    name: String,

    #[serde(default)]
    action: Option<String>,

    #[serde(default)]
    seconds: f64,
}

impl RawStep {
    fn into_definition(self) -> Result<StepDefinition, ConfigError> {
        let kind = StepKind::from_tag(&self.step_type)?;

        let mut step = match kind {
            StepKind::ManagementAgent => StepDefinition::agent(self.name),
            StepKind::LinearSequence => StepDefinition::linear(self.name),
            StepKind::ParallelSequence => StepDefinition::parallel(self.name),
            StepKind::Delay => {
                let mut delay = StepDefinition::delay(self.seconds);
                if !self.name.trim().is_empty() {
                    delay.name = self.name.trim().to_string();
                }
                delay
            }
        };

        if let Some(action) = self.action {
            step = step.with_action(action);
        }

        Ok(step)
    }
}

fn convert_steps(raw: Vec<RawStep>) -> Result<Vec<StepDefinition>, ConfigError> {
    raw.into_iter().map(RawStep::into_definition).collect()
}

fn trace_steps(owner: &str, steps: &[StepDefinition]) {
    trace!("List of steps for '{}'", owner);
    for step in steps {
        trace!(
            "Step '{}', Type '{}', Action '{}', Seconds '{}'",
            step.name,
            step.kind,
            step.action.as_deref().unwrap_or(""),
            step.seconds
        );
    }
}

/// Parses a configuration document from a YAML string.
///
/// # Example
///
/// ```
/// use sequencer::configuration::parse_config;
///
/// let config = parse_config(r#"
/// sequences:
///   - name: Imports
///     steps:
///       - { type: ManagementAgent, name: HR }
/// run_configurations:
///   - name: Default
///     profile: Delta Import
///     steps:
///       - { type: LinearSequence, name: Imports }
/// "#).unwrap();
///
/// assert!(config.run_configuration("default").is_some());
/// ```
pub fn parse_config(content: &str) -> Result<SchedulerConfig, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(content)?;

    let sequences = raw
        .sequences
        .into_iter()
        .map(|seq| Ok(SequenceDefinition::new(seq.name, convert_steps(seq.steps)?)))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let run_configurations = raw
        .run_configurations
        .into_iter()
        .map(|rc| {
            Ok(RunConfigurationDefinition::new(
                rc.name,
                rc.profile,
                convert_steps(rc.steps)?,
            ))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    if log::log_enabled!(log::Level::Trace) {
        for seq in &sequences {
            trace_steps(&seq.name, &seq.steps);
        }
        for rc in &run_configurations {
            trace_steps(&rc.name, &rc.steps);
        }
    }

    validate_definitions(&raw.parameters, &sequences, &run_configurations)?;

    let catalog = Catalog::from_sequences(sequences)?;
    let mut table = NamedMap::new();
    for rc in run_configurations {
        let name = rc.name.clone();
        table.insert(&name, rc)?;
    }

    Ok(SchedulerConfig {
        parameters: raw.parameters,
        agent: raw.agent,
        catalog,
        run_configurations: table,
    })
}

/// Loads a configuration document from a YAML file.
///
/// # Returns
///
/// * `Ok(SchedulerConfig)` - Parsed and validated configuration
/// * `Err(ConfigError::NotFound)` - The file does not exist
/// * `Err` - Read, parse or validation error
pub fn load_config(path: impl AsRef<Path>) -> Result<SchedulerConfig, ConfigError> {
    let path = path.as_ref();
    info!("Loading run configuration from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    debug!("YAML content loaded ({} bytes)", content.len());

    let config = parse_config(&content)?;

    info!(
        "Loaded {} sequences, {} run configurations",
        config.catalog.len(),
        config.run_configurations.len()
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
parameters:
  clear_run_history: true
  keep_history_days: 14
  delay_in_linear_sequence: 1
  delay_in_parallel_sequence: 0.5
  on_demand_schedule: Default
agent:
  run: ["agent-cli", "run", "{agent}", "{profile}"]
sequences:
  - name: Imports
    steps:
      - type: ManagementAgent
        name: HR
        action: Full Import
      - type: Delay
        seconds: 2
      - type: ParallelSequence
        name: Exports
  - name: Exports
    steps:
      - { type: ManagementAgent, name: AD }
      - { type: ManagementAgent, name: LDAP }
run_configurations:
  - name: Default
    profile: Delta Import
    steps:
      - type: LinearSequence
        name: Imports
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();

        assert_eq!(config.catalog.len(), 2);
        assert_eq!(config.run_configurations.len(), 1);
        assert!(config.parameters.clear_run_history);
        assert_eq!(config.parameters.keep_history_days, 14);
        assert_eq!(config.parameters.parallel_delay(), Duration::from_millis(500));
        assert_eq!(config.agent.as_ref().unwrap().run.len(), 4);

        let imports = config.catalog.get("imports").unwrap();
        assert_eq!(imports.steps[0].kind, StepKind::ManagementAgent);
        assert_eq!(imports.steps[0].action.as_deref(), Some("Full Import"));
        assert_eq!(imports.steps[1].kind, StepKind::Delay);
        assert_eq!(imports.steps[1].duration(), Duration::from_secs(2));
        assert_eq!(imports.steps[2].kind, StepKind::ParallelSequence);

        let default = config.run_configuration("DEFAULT").unwrap();
        assert_eq!(default.profile, "Delta Import");
        assert_eq!(default.steps[0].name, "Imports");
    }

    #[test]
    fn test_parse_unknown_step_type() {
        let yaml = r#"
sequences:
  - name: Bad
    steps:
      - { type: Teleport, name: X }
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownStepType(ref t) if t == "Teleport"));
    }

    #[test]
    fn test_parse_missing_type() {
        let yaml = r#"
sequences:
  - name: Bad
    steps:
      - { name: X }
"#;
        assert!(matches!(parse_config(yaml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_parse_empty_document_sections() {
        let config = parse_config("parameters: {}").unwrap();
        assert!(config.catalog.is_empty());
        assert!(config.run_configurations.is_empty());
        assert!(config.agent.is_none());
    }

    #[test]
    fn test_parse_duplicate_sequence_names() {
        let yaml = r#"
sequences:
  - name: Imports
  - name: imports
"#;
        assert!(parse_config(yaml).is_err());
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config("/nonexistent/path/run_configuration.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_config_valid_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join(RUN_CONFIG_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(&path).unwrap();
        assert!(config.catalog.contains("Exports"));
    }

    #[test]
    fn test_load_config_invalid_yaml() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.yaml");
        std::fs::write(&path, "this is not valid yaml: [[[").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}

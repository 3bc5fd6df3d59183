//! Execution Engine
//!
//! Selects a run configuration, binds it against the catalog and runs the
//! bound tree. Also drives the supporting operations around a run:
//! - on-demand runs of the configured default
//! - run-history housekeeping after a completed run
//! - best-effort stop of every running agent

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use super::agent::WorkloadRunner;
use super::binder::{bind_run_configuration, BoundPlan};
use super::step::RunContext;
use crate::configuration::{RunConfigurationDefinition, SchedulerConfig};
use crate::error::{BindError, EngineError, RemoteExecutionError};
use crate::monitoring::{EventType, ExecutionTimeline};

/// Outcome of one completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Display name of the run configuration
    pub configuration: String,
    /// Bind problems found before running
    pub diagnostics: Vec<BindError>,
    /// Events recorded while running
    pub timeline: ExecutionTimeline,
    /// Wall-clock duration of the run phase
    pub elapsed: Duration,
}

impl RunReport {
    /// Number of steps that reported a failure.
    pub fn failures(&self) -> usize {
        self.timeline.count(EventType::Failed)
    }

    /// True if every step completed and binding found nothing to report.
    pub fn is_clean(&self) -> bool {
        self.failures() == 0 && self.diagnostics.is_empty()
    }
}

/// Runs configurations from a loaded [`SchedulerConfig`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use sequencer::execution::{DryRunRunner, Engine};
/// use sequencer::load_config;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_config("run_configuration.yaml")?;
///     let engine = Engine::new(config, Arc::new(DryRunRunner));
///
///     let report = engine.run_configuration("Default")?;
///     println!("{}", report.timeline.gantt_chart());
///     Ok(())
/// }
/// ```
pub struct Engine {
    config: SchedulerConfig,
    runner: Arc<dyn WorkloadRunner>,
    // At most one top-level run at a time
    run_lock: Mutex<()>,
}

impl Engine {
    pub fn new(config: SchedulerConfig, runner: Arc<dyn WorkloadRunner>) -> Self {
        Self {
            config,
            runner,
            run_lock: Mutex::new(()),
        }
    }

    fn definition(&self, name: &str) -> Result<&RunConfigurationDefinition, EngineError> {
        self.config.run_configuration(name).ok_or_else(|| {
            error!("Run configuration '{}' not found.", name);
            EngineError::ConfigurationNotFound(name.to_string())
        })
    }

    /// Binds a run configuration without running it.
    pub fn bind(&self, name: &str) -> Result<BoundPlan, EngineError> {
        let definition = self.definition(name)?;
        Ok(bind_run_configuration(definition, &self.config.catalog))
    }

    /// Binds and runs the named run configuration.
    ///
    /// An unknown name fails before anything is bound or invoked. Workload
    /// failures are reported on the timeline; only structural misuse is
    /// returned as an error.
    pub fn run_configuration(&self, name: &str) -> Result<RunReport, EngineError> {
        let definition = self.definition(name)?;

        let _guard = self.run_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let plan = bind_run_configuration(definition, &self.config.catalog);
        for diagnostic in &plan.diagnostics {
            warn!("{}", diagnostic);
        }

        info!(
            "Starting run configuration '{}' with profile '{}'",
            definition.name, definition.profile
        );

        let timeline = ExecutionTimeline::new();
        let start = Instant::now();
        let ctx = RunContext::new(self.runner.as_ref(), &self.config.parameters, &timeline);

        plan.root.run(&ctx).map_err(|e| {
            error!("Run configuration '{}' aborted: {}", definition.name, e);
            e
        })?;

        let elapsed = start.elapsed();
        info!(
            "Run configuration '{}' finished in {:.2?} ({} failed steps)",
            definition.name,
            elapsed,
            timeline.count(EventType::Failed)
        );

        self.clear_run_history();

        Ok(RunReport {
            configuration: definition.name.clone(),
            diagnostics: plan.diagnostics,
            timeline,
            elapsed,
        })
    }

    /// Runs the configuration named by `on_demand_schedule`.
    pub fn run_on_demand(&self) -> Result<RunReport, EngineError> {
        let name = self.config.parameters.on_demand_schedule.trim();
        info!("On-demand run requested for '{}'", name);
        self.run_configuration(name)
    }

    /// Asks the runner to stop every running agent.
    pub fn stop_all(&self) -> Result<(), RemoteExecutionError> {
        info!("Stopping all management agents");
        self.runner.stop_all().map_err(|e| {
            error!("Stop request failed: {}", e);
            e
        })
    }

    /// Deletes run history older than `keep_history_days`, if enabled.
    ///
    /// Returns the cutoff that was requested, or `None` if housekeeping is
    /// disabled or the cutoff is out of range. Failures are only logged.
    pub fn clear_run_history(&self) -> Option<DateTime<Utc>> {
        let parameters = &self.config.parameters;
        if !parameters.clear_run_history || parameters.keep_history_days == 0 {
            return None;
        }

        let cutoff = chrono::Duration::try_days(i64::from(parameters.keep_history_days))
            .and_then(|keep| Utc::now().checked_sub_signed(keep));
        let Some(cutoff) = cutoff else {
            error!(
                "Cannot keep {} days of run history: date out of range, skipping",
                parameters.keep_history_days
            );
            return None;
        };
        info!("Clearing run history older than {}", cutoff.format("%Y-%m-%d %H:%M:%S"));

        match self.runner.clear_runs(cutoff) {
            Ok(status) => info!("Clear run history finished with status '{}'", status),
            Err(e) => error!("Clear run history failed: {}", e),
        }

        Some(cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::configuration::parse_config;
    use crate::error::ConfigError;
    use crate::execution::agent::testing::RecordingRunner;

    const CONFIG: &str = r#"
parameters:
  clear_run_history: false
  delay_in_linear_sequence: 0
  delay_in_parallel_sequence: 0
  on_demand_schedule: nightly
sequences:
  - name: Imports
    steps:
      - { type: ManagementAgent, name: HR }
      - { type: ManagementAgent, name: AD, action: Full Import }
  - name: Exports
    steps:
      - { type: ManagementAgent, name: LDAP }
      - { type: ManagementAgent, name: SQL }
run_configurations:
  - name: Default
    profile: Delta Import
    steps:
      - { type: LinearSequence, name: Imports }
      - { type: ParallelSequence, name: Exports, action: Export }
  - name: Nightly
    profile: Full Sync
    steps:
      - { type: ManagementAgent, name: HR }
"#;

    fn engine_with(yaml: &str) -> (Engine, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::new());
        let engine = Engine::new(parse_config(yaml).unwrap(), runner.clone());
        (engine, runner)
    }

    #[test]
    fn test_unknown_configuration_runs_nothing() {
        let (engine, runner) = engine_with(CONFIG);

        let err = engine.run_configuration("Weekly").unwrap_err();

        assert!(matches!(err, EngineError::ConfigurationNotFound(ref n) if n == "Weekly"));
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_run_configuration_propagates_profiles() {
        let (engine, runner) = engine_with(CONFIG);

        let report = engine.run_configuration("default").unwrap();

        assert_eq!(report.configuration, "Default");
        assert!(report.is_clean());
        assert_eq!(runner.invocation("HR").profile, "Delta Import");
        assert_eq!(runner.invocation("AD").profile, "Full Import");
        assert_eq!(runner.invocation("LDAP").profile, "Export");
        assert_eq!(runner.invocation("SQL").profile, "Export");

        let agents = runner.agents();
        assert_eq!(&agents[..2], &["HR", "AD"]);
    }

    #[test]
    fn test_failures_are_reported_not_returned() {
        let runner = Arc::new(RecordingRunner::new().failing("AD"));
        let engine = Engine::new(parse_config(CONFIG).unwrap(), runner.clone());

        let report = engine.run_configuration("Default").unwrap();

        assert_eq!(report.failures(), 1);
        assert_eq!(runner.invocations().len(), 4);
    }

    #[test]
    fn test_missing_sequence_is_a_diagnostic() {
        let yaml = r#"
run_configurations:
  - name: Default
    profile: Delta
    steps:
      - { type: LinearSequence, name: Ghost }
      - { type: ManagementAgent, name: HR }
"#;
        let (engine, runner) = engine_with(yaml);

        let report = engine.run_configuration("Default").unwrap();

        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(runner.agents(), vec!["HR"]);
    }

    #[test]
    fn test_same_agent_twice_in_parallel_keeps_both_runs() {
        let yaml = r#"
sequences:
  - name: Both
    steps:
      - { type: ManagementAgent, name: HR, action: Full Import }
      - { type: ManagementAgent, name: HR, action: Export }
run_configurations:
  - name: Default
    profile: Delta
    steps:
      - { type: ParallelSequence, name: Both }
"#;
        let runner = Arc::new(RecordingRunner::new().with_work(Duration::from_millis(100)));
        let engine = Engine::new(parse_config(yaml).unwrap(), runner.clone());

        let report = engine.run_configuration("Default").unwrap();

        let mut profiles: Vec<String> = runner.invocations().into_iter().map(|i| i.profile).collect();
        profiles.sort();
        assert_eq!(profiles, vec!["Export", "Full Import"]);

        let hr: Vec<_> = report
            .timeline
            .spans()
            .into_iter()
            .filter(|s| s.step_id == "HR")
            .collect();
        assert_eq!(hr.len(), 2);
        assert!(hr.iter().all(|s| s.duration_ms() >= 100));
    }

    #[test]
    fn test_run_on_demand() {
        let (engine, runner) = engine_with(CONFIG);

        let report = engine.run_on_demand().unwrap();

        assert_eq!(report.configuration, "Nightly");
        assert_eq!(runner.invocation("HR").profile, "Full Sync");
    }

    #[test]
    fn test_run_on_demand_without_name() {
        let (engine, runner) = engine_with("parameters: {}");

        assert!(matches!(
            engine.run_on_demand(),
            Err(EngineError::ConfigurationNotFound(_))
        ));
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_housekeeping_after_run() {
        let yaml = CONFIG.replace("clear_run_history: false", "clear_run_history: true\n  keep_history_days: 30");
        let (engine, runner) = engine_with(&yaml);

        engine.run_configuration("Nightly").unwrap();

        let cleared = runner.cleared();
        assert_eq!(cleared.len(), 1);
        assert_eq!((Utc::now() - cleared[0]).num_days(), 30);
    }

    #[test]
    fn test_housekeeping_out_of_range_is_skipped() {
        let yaml = CONFIG.replace(
            "clear_run_history: false",
            "clear_run_history: true\n  keep_history_days: 4000000000",
        );
        let (engine, runner) = engine_with(&yaml);

        let report = engine.run_configuration("Nightly").unwrap();

        assert_eq!(report.configuration, "Nightly");
        assert!(engine.clear_run_history().is_none());
        assert!(runner.cleared().is_empty());
    }

    #[test]
    fn test_out_of_range_delay_is_rejected_before_running() {
        let yaml = CONFIG.replace("delay_in_linear_sequence: 0", "delay_in_linear_sequence: 1e20");
        assert!(matches!(parse_config(&yaml), Err(ConfigError::Invalid(_))));

        let yaml = CONFIG.replace(
            "- { type: ManagementAgent, name: SQL }",
            "- { type: ManagementAgent, name: SQL }\n      - { type: Delay, seconds: 1e20 }",
        );
        assert!(matches!(parse_config(&yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_housekeeping_disabled() {
        let (engine, runner) = engine_with(CONFIG);

        engine.run_configuration("Nightly").unwrap();

        assert!(engine.clear_run_history().is_none());
        assert!(runner.cleared().is_empty());
    }

    #[test]
    fn test_stop_all_delegates_to_runner() {
        let (engine, runner) = engine_with(CONFIG);

        engine.stop_all().unwrap();

        assert_eq!(runner.stops(), 1);
    }

    #[test]
    fn test_bind_only_does_not_invoke() {
        let (engine, runner) = engine_with(CONFIG);

        let plan = engine.bind("Default").unwrap();

        assert_eq!(plan.root.describe().agent_count(), 4);
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn test_concurrent_requests_are_serialized() {
        let runner = Arc::new(RecordingRunner::new().with_work(Duration::from_millis(30)));
        let engine = Engine::new(parse_config(CONFIG).unwrap(), runner.clone());

        thread::scope(|scope| {
            scope.spawn(|| engine.run_configuration("Nightly").unwrap());
            scope.spawn(|| engine.run_configuration("Nightly").unwrap());
        });

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 2);
        let (first, second) = if invocations[0].started <= invocations[1].started {
            (&invocations[0], &invocations[1])
        } else {
            (&invocations[1], &invocations[0])
        };
        assert!(second.started >= first.finished);
    }
}

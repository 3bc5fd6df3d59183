//! Sequencer CLI Entry Point
//!
//! Provides command-line interface for running configurations.
//!
//! # Usage
//!
//! ```bash
//! # Run a configuration from the working directory's document
//! sequencer Default
//!
//! # Run the on-demand configuration
//! sequencer --on-demand
//!
//! # Show the bound plan without running anything
//! sequencer Default --plan --json
//!
//! # Validate a specific document
//! sequencer --config /etc/sequencer/run_configuration.yaml --check
//!
//! # Log agent invocations instead of running them
//! sequencer Default --dry-run
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info, warn};

use sequencer::configuration::{load_config, quick_validate, RUN_CONFIG_FILE};
use sequencer::environment::{EnvLocationResolver, LocationResolver};
use sequencer::execution::{CommandRunner, DryRunRunner, Engine, RunReport, WorkloadRunner};
use sequencer::{APP_NAME, VERSION};

/// Command-line configuration parsed from arguments.
#[derive(Debug, Default)]
struct Config {
    run_name: Option<String>,
    config_path: Option<PathBuf>,
    on_demand: bool,
    plan: bool,
    json: bool,
    check: bool,
    dry_run: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME.bold(), VERSION);
    println!("Configuration-Driven Step Execution Engine");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: sequencer [OPTIONS] [RUN_CONFIGURATION]");
    println!();
    println!("Arguments:");
    println!("  [RUN_CONFIGURATION]  Name of the run configuration (default: on-demand schedule)");
    println!();
    println!("Options:");
    println!("  --config PATH        Configuration document (default: {} in the working directory)", RUN_CONFIG_FILE);
    println!("  --on-demand          Run the configured on-demand run configuration");
    println!("  --plan               Print the bound plan without running it");
    println!("  --json               Print the plan as JSON instead of YAML");
    println!("  --check              Validate the configuration and exit");
    println!("  --dry-run            Log agent invocations instead of running them");
    println!("  --verbose            Enable debug logging");
    println!("  --help               Show this help message");
    println!("  --version            Show version information");
    println!();
    println!("Examples:");
    println!("  sequencer Default");
    println!("  sequencer --on-demand --dry-run");
    println!("  sequencer Default --plan --json");
}

/// Parses command-line arguments into a Config struct.
fn parse_arguments(args: &[String]) -> Result<Config, String> {
    let mut config = Config::default();
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    return Err("--config requires a path argument".to_string());
                }
                config.config_path = Some(PathBuf::from(&args[i]));
            }
            "--on-demand" => config.on_demand = true,
            "--plan" => config.plan = true,
            "--json" => config.json = true,
            "--check" => config.check = true,
            "--dry-run" => config.dry_run = true,
            "--verbose" | "-v" => config.verbose = true,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                if config.run_name.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                config.run_name = Some(arg.clone());
            }
        }
        i += 1;
    }

    if config.on_demand && config.run_name.is_some() {
        return Err("--on-demand cannot be combined with a run configuration name".to_string());
    }

    Ok(config)
}

/// Finds the configuration document and the directory agents run in.
fn locate_config(config_path: Option<PathBuf>) -> Result<(PathBuf, PathBuf), Box<dyn std::error::Error>> {
    if let Some(path) = config_path {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => env::current_dir()?,
        };
        return Ok((path, dir));
    }

    let dir = EnvLocationResolver::new().resolve_working_directory()?;
    Ok((dir.join(RUN_CONFIG_FILE), dir))
}

/// Prints the colored run summary and the timeline chart.
fn print_summary(report: &RunReport) {
    println!();
    let headline = format!(
        "Run configuration '{}' finished in {:.2?}",
        report.configuration, report.elapsed
    );

    if report.is_clean() {
        println!("{}", headline.green().bold());
    } else {
        println!("{}", headline.yellow().bold());
    }

    let failed = report.timeline.failed_steps();
    if !failed.is_empty() {
        println!("  {} {}", "Failed steps:".red(), failed.join(", "));
    }
    for diagnostic in &report.diagnostics {
        println!("  {} {}", "Diagnostic:".yellow(), diagnostic);
    }

    println!();
    println!("{}", report.timeline.gantt_chart());
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let cli = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(cli.verbose);

    // Plan output stays machine-readable
    if !cli.plan {
        print_banner();
    }

    let (config_path, working_dir) = locate_config(cli.config_path)?;
    info!("Loading configuration: {}", config_path.display());
    let config = load_config(&config_path).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if cli.check {
        let problems = quick_validate(&config);
        if problems.is_empty() {
            println!("{}", "Configuration is valid".green().bold());
        } else {
            println!("{}", format!("{} warnings:", problems.len()).yellow().bold());
            for problem in &problems {
                println!("  - {}", problem);
            }
        }
        return Ok(());
    }

    let runner: Arc<dyn WorkloadRunner> = if cli.dry_run {
        info!("Mode: DRY RUN (agents will not be invoked)");
        Arc::new(DryRunRunner)
    } else {
        let commands = config
            .agent
            .clone()
            .ok_or("Configuration has no 'agent' section; use --dry-run to run without one")?;
        Arc::new(CommandRunner::new(commands).with_working_dir(&working_dir))
    };

    let run_name = match cli.run_name {
        Some(name) => name,
        None => {
            if !cli.on_demand {
                warn!("No run configuration given, using the on-demand schedule");
            }
            config.parameters.on_demand_schedule.clone()
        }
    };

    let engine = Engine::new(config, runner);

    if cli.plan {
        let description = engine.bind(&run_name)?.describe();
        let output = if cli.json {
            serde_json::to_string_pretty(&description)?
        } else {
            serde_yaml::to_string(&description)?
        };
        println!("{}", output);
        return Ok(());
    }

    let report = if cli.on_demand {
        engine.run_on_demand()?
    } else {
        engine.run_configuration(&run_name)?
    };

    print_summary(&report);
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

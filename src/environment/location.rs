//! Working Directory Lookup
//!
//! The working directory holds the configuration document and is the
//! directory agent commands are started in.
//!
//! # Resolution Priority
//!
//! 1. The `SEQUENCER_HOME` environment variable
//! 2. The executable's directory, if it contains the configuration document
//! 3. The current directory

use std::env;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::configuration::RUN_CONFIG_FILE;
use crate::error::ConfigError;

/// Environment variable naming the working directory.
pub const HOME_VARIABLE: &str = "SEQUENCER_HOME";

/// Host-environment lookup of the working directory.
pub trait LocationResolver {
    fn resolve_working_directory(&self) -> Result<PathBuf, ConfigError>;
}

/// Resolves the working directory from the process environment.
#[derive(Debug, Clone)]
pub struct EnvLocationResolver {
    variable: String,
    exe_dir: Option<PathBuf>,
}

impl EnvLocationResolver {
    pub fn new() -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        Self {
            variable: HOME_VARIABLE.to_string(),
            exe_dir,
        }
    }

    /// Reads the working directory from another environment variable.
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    /// Overrides the directory searched as the executable's location.
    pub fn with_exe_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.exe_dir = dir;
        self
    }
}

impl Default for EnvLocationResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationResolver for EnvLocationResolver {
    fn resolve_working_directory(&self) -> Result<PathBuf, ConfigError> {
        // Priority 1: explicit environment variable
        if let Some(value) = env::var_os(&self.variable).filter(|v| !v.is_empty()) {
            let dir = PathBuf::from(value);
            if dir.is_dir() {
                info!("Using working directory from {}: {}", self.variable, dir.display());
                return Ok(dir);
            }
            warn!("{} points to a missing directory: {}", self.variable, dir.display());
            return Err(ConfigError::WorkingDirectoryNotFound);
        }

        // Priority 2: next to the executable
        if let Some(dir) = &self.exe_dir {
            if dir.join(RUN_CONFIG_FILE).is_file() {
                info!("Using executable directory: {}", dir.display());
                return Ok(dir.clone());
            }
            debug!("No {} next to the executable in {}", RUN_CONFIG_FILE, dir.display());
        }

        // Priority 3: current directory
        let cwd = env::current_dir().map_err(|_| ConfigError::WorkingDirectoryNotFound)?;
        info!("Using current directory: {}", cwd.display());
        Ok(cwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    // Each test uses its own variable name so tests can run in parallel.

    #[test]
    fn test_variable_wins() {
        let temp_dir = tempdir().unwrap();
        env::set_var("SEQUENCER_TEST_HOME_SET", temp_dir.path());

        let resolver = EnvLocationResolver::new().with_variable("SEQUENCER_TEST_HOME_SET");
        assert_eq!(resolver.resolve_working_directory().unwrap(), temp_dir.path());
    }

    #[test]
    fn test_variable_pointing_nowhere_fails() {
        env::set_var("SEQUENCER_TEST_HOME_MISSING", "/nonexistent/sequencer/home");

        let resolver = EnvLocationResolver::new().with_variable("SEQUENCER_TEST_HOME_MISSING");
        assert!(matches!(
            resolver.resolve_working_directory(),
            Err(ConfigError::WorkingDirectoryNotFound)
        ));
    }

    #[test]
    fn test_exe_dir_with_config_file() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(RUN_CONFIG_FILE), "parameters: {}").unwrap();

        let resolver = EnvLocationResolver::new()
            .with_variable("SEQUENCER_TEST_HOME_UNSET_1")
            .with_exe_dir(Some(temp_dir.path().to_path_buf()));
        assert_eq!(resolver.resolve_working_directory().unwrap(), temp_dir.path());
    }

    #[test]
    fn test_falls_back_to_current_dir() {
        let temp_dir = tempdir().unwrap();

        let resolver = EnvLocationResolver::new()
            .with_variable("SEQUENCER_TEST_HOME_UNSET_2")
            .with_exe_dir(Some(temp_dir.path().to_path_buf()));
        assert_eq!(
            resolver.resolve_working_directory().unwrap(),
            env::current_dir().unwrap()
        );
    }
}

//! Toolchain configuration for the pipeline.
//!
//! Configuration is layered: built-in defaults, then an optional YAML file,
//! then `ADFORGE_*` environment variables, then validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::toolchain::ExitPolicy;
use crate::workspace::WorkRoots;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// The configuration file could not be parsed.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Commands used to check a generated function numerically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Reference inverse dynamics tool, program first.
    /// Called as `<cmd...> <model> <input.json> <output.json>`.
    pub reference_command: Vec<String>,
    /// Evaluator for the compiled function, program first.
    /// Called as `<cmd...> <library> <input.json> <output.json>`.
    pub evaluator_command: Vec<String>,
    /// Maximum absolute torque difference accepted.
    pub tolerance: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            reference_command: Vec::new(),
            evaluator_command: Vec::new(),
            tolerance: 1e-6,
        }
    }
}

/// Configuration of the external toolchain and working directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Directory holding the three working-directory roots.
    pub work_root: PathBuf,
    /// CMake project of the AD-enabled model-building tool.
    pub ad_project_dir: PathBuf,
    /// Build system executable.
    pub cmake: String,
    /// Interpreter running the code-generation driver.
    pub python: String,
    /// Build configuration passed to the build system.
    pub build_type: String,
    /// Generator used when a job does not name a compiler.
    pub default_compiler: Option<String>,
    /// Treatment of non-zero exit codes.
    pub exit_policy: ExitPolicy,
    /// Suffix job directories with a random id.
    pub unique_job_dirs: bool,
    pub verify: VerifyConfig,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("./adforge-work"),
            ad_project_dir: PathBuf::from("./opensimAD-install"),
            cmake: "cmake".to_string(),
            python: if cfg!(windows) { "python" } else { "python3" }.to_string(),
            build_type: "RelWithDebInfo".to_string(),
            default_compiler: None,
            exit_policy: ExitPolicy::Strict,
            unique_job_dirs: false,
            verify: VerifyConfig::default(),
        }
    }
}

impl ToolchainConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads defaults, an optional YAML file and environment overrides.
    ///
    /// # Environment Variables
    ///
    /// - `ADFORGE_WORK_ROOT`: working-directory root (default: ./adforge-work)
    /// - `ADFORGE_AD_PROJECT`: AD tool CMake project (default: ./opensimAD-install)
    /// - `ADFORGE_CMAKE`: build system executable (default: cmake)
    /// - `ADFORGE_PYTHON`: code-generation interpreter (default: python3)
    /// - `ADFORGE_BUILD_TYPE`: build configuration (default: RelWithDebInfo)
    /// - `ADFORGE_COMPILER`: default generator identifier
    /// - `ADFORGE_EXIT_POLICY`: `strict` or `best_effort` (default: strict)
    /// - `ADFORGE_UNIQUE_JOB_DIRS`: suffix job directories (default: false)
    /// - `ADFORGE_VERIFY_REFERENCE`: whitespace-separated reference command
    /// - `ADFORGE_VERIFY_EVALUATOR`: whitespace-separated evaluator command
    /// - `ADFORGE_VERIFY_TOLERANCE`: verification tolerance (default: 1e-6)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML configuration file; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Applies overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ADFORGE_WORK_ROOT") {
            self.work_root = PathBuf::from(val);
        }

        if let Some(val) = lookup("ADFORGE_AD_PROJECT") {
            self.ad_project_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("ADFORGE_CMAKE") {
            self.cmake = val;
        }

        if let Some(val) = lookup("ADFORGE_PYTHON") {
            self.python = val;
        }

        if let Some(val) = lookup("ADFORGE_BUILD_TYPE") {
            self.build_type = val;
        }

        if let Some(val) = lookup("ADFORGE_COMPILER") {
            self.default_compiler = Some(val).filter(|v| !v.trim().is_empty());
        }

        if let Some(val) = lookup("ADFORGE_EXIT_POLICY") {
            self.exit_policy = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "ADFORGE_EXIT_POLICY".to_string(),
                message,
            })?;
        }

        if let Some(val) = lookup("ADFORGE_UNIQUE_JOB_DIRS") {
            self.unique_job_dirs = parse_env_bool(&val, "ADFORGE_UNIQUE_JOB_DIRS")?;
        }

        if let Some(val) = lookup("ADFORGE_VERIFY_REFERENCE") {
            self.verify.reference_command = split_command(&val);
        }

        if let Some(val) = lookup("ADFORGE_VERIFY_EVALUATOR") {
            self.verify.evaluator_command = split_command(&val);
        }

        if let Some(val) = lookup("ADFORGE_VERIFY_TOLERANCE") {
            self.verify.tolerance = parse_env_value(&val, "ADFORGE_VERIFY_TOLERANCE")?;
        }

        Ok(())
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.work_root.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "work_root cannot be empty".to_string(),
            ));
        }

        if self.cmake.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "cmake cannot be empty".to_string(),
            ));
        }

        if self.python.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "python cannot be empty".to_string(),
            ));
        }

        if self.build_type.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "build_type cannot be empty".to_string(),
            ));
        }

        if !(self.verify.tolerance > 0.0 && self.verify.tolerance.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "verify.tolerance must be a positive number".to_string(),
            ));
        }

        Ok(())
    }

    /// Working-directory roots derived from `work_root`.
    pub fn roots(&self) -> WorkRoots {
        WorkRoots::new(&self.work_root)
    }

    /// Builder method to set the work root.
    pub fn with_work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = dir.into();
        self
    }

    /// Builder method to set the AD tool project directory.
    pub fn with_ad_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ad_project_dir = dir.into();
        self
    }

    /// Builder method to set the build system executable.
    pub fn with_cmake(mut self, program: impl Into<String>) -> Self {
        self.cmake = program.into();
        self
    }

    /// Builder method to set the code-generation interpreter.
    pub fn with_python(mut self, program: impl Into<String>) -> Self {
        self.python = program.into();
        self
    }

    /// Builder method to set the exit policy.
    pub fn with_exit_policy(mut self, policy: ExitPolicy) -> Self {
        self.exit_policy = policy;
        self
    }

    /// Builder method to enable unique job directories.
    pub fn with_unique_job_dirs(mut self, unique: bool) -> Self {
        self.unique_job_dirs = unique;
        self
    }

    /// Builder method to set the verification commands.
    pub fn with_verify_commands<I, J, S, T>(mut self, reference: I, evaluator: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        self.verify.reference_command = reference.into_iter().map(Into::into).collect();
        self.verify.evaluator_command = evaluator.into_iter().map(Into::into).collect();
        self
    }
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(String::from).collect()
}

/// Parse an environment variable value.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ToolchainConfig::default();
        assert_eq!(config.cmake, "cmake");
        assert_eq!(config.build_type, "RelWithDebInfo");
        assert_eq!(config.exit_policy, ExitPolicy::Strict);
        assert!(!config.unique_job_dirs);
        assert!((config.verify.tolerance - 1e-6).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ToolchainConfig::default();
        config
            .apply_env(lookup(&[
                ("ADFORGE_WORK_ROOT", "/tmp/work"),
                ("ADFORGE_COMPILER", "Visual Studio 17 2022"),
                ("ADFORGE_EXIT_POLICY", "best_effort"),
                ("ADFORGE_UNIQUE_JOB_DIRS", "yes"),
                ("ADFORGE_VERIFY_REFERENCE", "python3 reference_id.py"),
                ("ADFORGE_VERIFY_TOLERANCE", "1e-4"),
            ]))
            .unwrap();

        assert_eq!(config.work_root, PathBuf::from("/tmp/work"));
        assert_eq!(config.default_compiler.as_deref(), Some("Visual Studio 17 2022"));
        assert_eq!(config.exit_policy, ExitPolicy::BestEffort);
        assert!(config.unique_job_dirs);
        assert_eq!(config.verify.reference_command, vec!["python3", "reference_id.py"]);
        assert!((config.verify.tolerance - 1e-4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = ToolchainConfig::default();
        let err = config
            .apply_env(lookup(&[("ADFORGE_UNIQUE_JOB_DIRS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = config
            .apply_env(lookup(&[("ADFORGE_EXIT_POLICY", "lenient")]))
            .unwrap_err();
        assert!(err.to_string().contains("ADFORGE_EXIT_POLICY"));
    }

    #[test]
    fn test_validation() {
        let mut config = ToolchainConfig::default();
        config.verify.tolerance = 0.0;
        assert!(config.validate().is_err());

        let config = ToolchainConfig::default().with_cmake(" ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("adforge.yaml");
        fs::write(
            &path,
            "work_root: /data/work\nexit_policy: best_effort\nverify:\n  tolerance: 0.001\n",
        )
        .unwrap();

        let config = ToolchainConfig::from_yaml_file(&path).unwrap();
        assert_eq!(config.work_root, PathBuf::from("/data/work"));
        assert_eq!(config.exit_policy, ExitPolicy::BestEffort);
        assert_eq!(config.cmake, "cmake");
        assert!((config.verify.tolerance - 0.001).abs() < f64::EPSILON);
        assert!(config.verify.reference_command.is_empty());
    }

    #[test]
    fn test_roots_follow_work_root() {
        let config = ToolchainConfig::new().with_work_root("/w");
        assert_eq!(config.roots().graph, PathBuf::from("/w/build-ExpressionGraph"));
    }
}

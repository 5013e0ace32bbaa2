//! External process invocation.
//!
//! Every external tool runs through [`ToolRunner`], which awaits the child
//! without a timeout, logs its output and applies the [`ExitPolicy`].
//! Children always get an explicit working directory; the parent process
//! working directory is never changed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::ToolError;

/// Maximum number of stderr characters kept in error messages.
const STDERR_TAIL: usize = 2000;

/// How non-zero exit codes are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// A non-zero exit fails the stage.
    #[default]
    Strict,
    /// A non-zero exit is logged and the pipeline continues.
    BestEffort,
}

impl std::str::FromStr for ExitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(ExitPolicy::Strict),
            "best_effort" => Ok(ExitPolicy::BestEffort),
            other => Err(format!("unknown exit policy '{}'", other)),
        }
    }
}

/// A fully specified external command.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Short name used in logs and errors.
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl ToolInvocation {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().to_string())
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the child working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Command line for logging.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs tool invocations under an exit policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRunner {
    pub policy: ExitPolicy,
    /// Log tool output at info instead of debug.
    pub verbose: bool,
}

impl ToolRunner {
    pub fn new(policy: ExitPolicy, verbose: bool) -> Self {
        Self { policy, verbose }
    }

    /// Runs the invocation to completion.
    pub async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        info!(tool = %invocation.label, command = %invocation.display(), "Running external tool");
        let start = Instant::now();

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|source| ToolError::Spawn {
            tool: invocation.label.clone(),
            source,
        })?;

        let result = ToolOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if self.verbose {
            info!(tool = %invocation.label, stdout = %result.stdout.trim_end(), stderr = %result.stderr.trim_end(), "Tool output");
        } else {
            debug!(tool = %invocation.label, stdout = %result.stdout.trim_end(), stderr = %result.stderr.trim_end(), "Tool output");
        }

        debug!(
            tool = %invocation.label,
            exit_code = ?result.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool finished"
        );

        if result.success {
            return Ok(result);
        }

        match self.policy {
            ExitPolicy::Strict => Err(ToolError::NonZeroExit {
                tool: invocation.label.clone(),
                code: result.exit_code,
                stderr: tail(&result.stderr, STDERR_TAIL),
            }),
            ExitPolicy::BestEffort => {
                warn!(
                    tool = %invocation.label,
                    exit_code = ?result.exit_code,
                    "Tool failed; continuing under best-effort exit policy"
                );
                Ok(result)
            }
        }
    }
}

/// Resolves `path` against the current directory. Tools run with their own
/// working directory, so every path handed to them must be absolute.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, ToolError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(ToolError::io("resolve", path))?;
    Ok(cwd.join(path))
}

/// Keeps the last `max` characters of `s`.
fn tail(s: &str, max: usize) -> String {
    let trimmed = s.trim_end();
    let count = trimmed.chars().count();
    if count <= max {
        return trimmed.to_string();
    }
    let skip = count - max;
    format!("...{}", trimmed.chars().skip(skip).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_policy_parse() {
        assert_eq!("strict".parse::<ExitPolicy>().unwrap(), ExitPolicy::Strict);
        assert_eq!("best-effort".parse::<ExitPolicy>().unwrap(), ExitPolicy::BestEffort);
        assert_eq!("Best_Effort".parse::<ExitPolicy>().unwrap(), ExitPolicy::BestEffort);
        assert!("lenient".parse::<ExitPolicy>().is_err());
        assert_eq!(ExitPolicy::default(), ExitPolicy::Strict);
    }

    #[test]
    fn test_invocation_display() {
        let invocation = ToolInvocation::new("cmake", "cmake")
            .args(["--build", "build"])
            .arg("--target")
            .arg("install");
        assert_eq!(invocation.display(), "cmake --build build --target install");
    }

    #[test]
    fn test_tail() {
        assert_eq!(tail("short\n", 10), "short");
        assert_eq!(tail("abcdefghij", 3), "...hij");
    }

    #[test]
    fn test_absolute() {
        let path = absolute(Path::new("out/gait.cpp")).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("out/gait.cpp"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ToolRunner::default();
        let invocation = ToolInvocation::new("ghost", "ad-forge-no-such-program");
        let err = runner.run(&invocation).await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_strict_policy_fails_on_exit_code() {
        let runner = ToolRunner::new(ExitPolicy::Strict, false);
        let invocation = ToolInvocation::new("sh", "sh").args(["-c", "echo nope >&2; exit 3"]);
        match runner.run(&invocation).await {
            Err(ToolError::NonZeroExit { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_best_effort_policy_continues() {
        let runner = ToolRunner::new(ExitPolicy::BestEffort, true);
        let invocation = ToolInvocation::new("sh", "sh").args(["-c", "exit 1"]);
        let output = runner.run(&invocation).await.unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code, Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_working_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let before = std::env::current_dir().unwrap();
        let invocation = ToolInvocation::new("sh", "sh")
            .args(["-c", "pwd"])
            .current_dir(dir.path());
        let output = ToolRunner::default().run(&invocation).await.unwrap();

        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}

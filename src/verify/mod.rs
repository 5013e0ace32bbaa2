//! Numerical verification of a compiled function.
//!
//! A reference inverse dynamics tool and an evaluator for the compiled
//! library are both run on the same input vector; the residual block of
//! the function output is compared with the reference torques.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::emitter::{zero_based, IndexMap};
use crate::error::{ToolError, VerifyError};
use crate::pipeline::VerifyConfig;
use crate::toolchain::process::absolute;
use crate::toolchain::{ToolInvocation, ToolRunner};

const POSITION: f64 = 0.05;
const VELOCITY: f64 = 0.1;
const ACCELERATION: f64 = 0.2;

/// Result of comparing the compiled function with the reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub passed: bool,
    pub max_abs_error: f64,
    pub tolerance: f64,
    /// Coordinate with the largest error, if any were compared.
    pub worst_coordinate: Option<String>,
    /// Number of residuals compared.
    pub compared: usize,
}

/// Builds the deterministic input vector used for verification.
///
/// Positions alternate between +0.05 and -0.05 in coordinate order,
/// velocities are 0.1, accelerations 0.2 and extra inputs 0.
pub fn representative_input(map: &IndexMap) -> Vec<f64> {
    let mut input = vec![0.0; map.n_inputs];
    for (i, name) in map.coordinate_order.iter().enumerate() {
        let Some(offsets) = map.coordinates.get(name) else {
            continue;
        };
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        input[zero_based(offsets.position)] = sign * POSITION;
        input[zero_based(offsets.velocity)] = VELOCITY;
        input[zero_based(offsets.acceleration)] = ACCELERATION;
    }
    input
}

/// Runs the configured reference and evaluator tools.
#[derive(Debug, Clone)]
pub struct Verifier<'a> {
    runner: ToolRunner,
    config: &'a VerifyConfig,
}

impl<'a> Verifier<'a> {
    pub fn new(runner: ToolRunner, config: &'a VerifyConfig) -> Self {
        Self { runner, config }
    }

    /// Compares `library` against the reference for `model`.
    pub async fn verify(
        &self,
        model: &Path,
        library: &Path,
        map: &IndexMap,
    ) -> Result<VerificationOutcome, VerifyError> {
        let reference_cmd = split_command(&self.config.reference_command, "reference")?;
        let evaluator_cmd = split_command(&self.config.evaluator_command, "evaluator")?;

        let scratch = TempDir::new().map_err(|e| ToolError::Io {
            op: "create directory",
            path: std::env::temp_dir(),
            source: e,
        })?;
        let input_path = scratch.path().join("input.json");
        let reference_out = scratch.path().join("reference_out.json");
        let function_out = scratch.path().join("function_out.json");

        let input = representative_input(map);
        let json = serde_json::to_string(&input).map_err(|e| VerifyError::Parse {
            path: input_path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&input_path, json).map_err(ToolError::io("write", &input_path))?;

        let reference = invocation("reference inverse dynamics", reference_cmd, &absolute(model)?)
            .path_arg(&input_path)
            .path_arg(&reference_out)
            .current_dir(scratch.path());
        self.runner.run(&reference).await?;

        let evaluator = invocation("function evaluator", evaluator_cmd, &absolute(library)?)
            .path_arg(&input_path)
            .path_arg(&function_out)
            .current_dir(scratch.path());
        self.runner.run(&evaluator).await?;

        let torques = read_vector(&reference_out, map.n_coordinates)?;
        let outputs = read_vector(&function_out, map.n_outputs)?;
        let outcome = compare(map, &torques, &outputs, self.config.tolerance);

        if outcome.passed {
            info!(max_abs_error = outcome.max_abs_error, compared = outcome.compared, "Verification passed");
        } else {
            warn!(
                max_abs_error = outcome.max_abs_error,
                tolerance = outcome.tolerance,
                coordinate = ?outcome.worst_coordinate,
                "Verification mismatch"
            );
        }
        Ok(outcome)
    }
}

fn split_command<'c>(command: &'c [String], what: &'static str) -> Result<(&'c str, &'c [String]), VerifyError> {
    match command.split_first() {
        Some((program, args)) if !program.trim().is_empty() => Ok((program.as_str(), args)),
        _ => Err(VerifyError::NotConfigured(what)),
    }
}

fn invocation(label: &str, (program, args): (&str, &[String]), subject: &Path) -> ToolInvocation {
    ToolInvocation::new(label, program)
        .args(args.iter().cloned())
        .path_arg(subject)
}

fn read_vector(path: &Path, expected: usize) -> Result<Vec<f64>, VerifyError> {
    let content = fs::read_to_string(path).map_err(|e| VerifyError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let values: Vec<f64> = serde_json::from_str(&content).map_err(|e| VerifyError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if values.len() < expected {
        return Err(VerifyError::Shape {
            path: PathBuf::from(path),
            expected,
            actual: values.len(),
        });
    }
    Ok(values)
}

/// Compares residual outputs with reference torques in coordinate order.
fn compare(map: &IndexMap, torques: &[f64], outputs: &[f64], tolerance: f64) -> VerificationOutcome {
    let mut max_abs_error = 0.0_f64;
    let mut worst_coordinate = None;
    let mut compared = 0;

    for (i, name) in map.coordinate_order.iter().enumerate() {
        let Some(&offset) = map.residuals.get(name) else {
            continue;
        };
        let error = (outputs[zero_based(offset)] - torques[i]).abs();
        compared += 1;
        if error > max_abs_error || worst_coordinate.is_none() {
            max_abs_error = max_abs_error.max(error);
            worst_coordinate = Some(name.clone());
        }
    }

    VerificationOutcome {
        passed: max_abs_error <= tolerance,
        max_abs_error,
        tolerance,
        worst_coordinate,
        compared,
    }
}

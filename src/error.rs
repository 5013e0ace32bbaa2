//! Error types for ad-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Model loading and validation
//! - Source and index-map emission
//! - External tool invocation (AD build, code generation, native build)
//! - Numerical verification

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading or validating a model description.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported model format '{extension}' for {path}: export the model to YAML or JSON first")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to parse model file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid model: {0}")]
    Invalid(String),

    #[error("Unknown body '{0}'")]
    UnknownBody(String),

    #[error("{what} order does not match the model: {message}")]
    OrderMismatch { what: &'static str, message: String },

    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while emitting the source file and index map.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Invalid job name '{0}': must be a C identifier")]
    InvalidJobName(String),

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),

    #[error("Failed to {op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EmitError {
    pub(crate) fn io<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| EmitError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors raised while driving an external tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {}: {stderr}", describe_exit(.code))]
    NonZeroExit {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Expected artifact was not produced: {0}")]
    MissingArtifact(PathBuf),

    #[error("Failed to {op} '{path}': {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template rendering error: {0}")]
    Template(#[from] tera::Error),

    #[error("Index map error: {0}")]
    IndexMap(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

impl ToolError {
    pub(crate) fn io<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| ToolError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Errors raised while running the verification tools.
///
/// A numerical mismatch is not an error; it is reported through
/// [`crate::verify::VerificationOutcome`].
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Verification tool failed: {0}")]
    Tool(#[from] ToolError),

    #[error("No {0} command configured for verification")]
    NotConfigured(&'static str),

    #[error("Failed to parse verification output '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Verification output '{path}' has {actual} values, expected at least {expected}")]
    Shape {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },
}

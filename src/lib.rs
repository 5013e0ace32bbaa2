//! ad-forge: orchestration of external AD and build toolchains for
//! musculoskeletal derivative functions.
//!
//! A model description is turned into an AD source file and an index map,
//! recorded into an expression graph by an external AD program, compiled to
//! derivative code by an external code generator and, optionally, built into
//! a shared library and verified against reference inverse dynamics.

pub mod cli;
pub mod emitter;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod toolchain;
pub mod verify;
pub mod workspace;

// Re-export commonly used error types
pub use error::{EmitError, ModelError, ToolError, VerifyError};
pub use pipeline::{JobSpec, PipelineError, PipelineOrchestrator, PipelineReport, ToolchainConfig};

//! Job pipeline.
//!
//! - [`config`]: toolchain and working-directory configuration
//! - [`job`]: per-job options
//! - [`orchestrator`]: stage sequencing, cleanup and reporting
//!
//! # Example
//!
//! ```rust,ignore
//! use ad_forge::pipeline::{JobSpec, PipelineOrchestrator, ToolchainConfig};
//!
//! let config = ToolchainConfig::load(None)?;
//! let job = JobSpec::new("models/gait2d.yaml", "out", "gait2d").with_no_dll(true);
//!
//! let report = PipelineOrchestrator::new(config).run(&job).await?;
//! println!("{} reached {}", report.job, report.final_stage);
//! ```

pub mod config;
pub mod job;
pub mod orchestrator;

pub use config::{ConfigError, ToolchainConfig, VerifyConfig};
pub use job::JobSpec;
pub use orchestrator::{
    PipelineError, PipelineOrchestrator, PipelineReport, ReportArtifacts, RunStatus, Stage,
    StageError, StageTiming,
};

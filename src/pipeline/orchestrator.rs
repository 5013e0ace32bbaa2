//! Pipeline orchestrator.
//!
//! Runs one job through the linear stage sequence
//! `Init → SourceEmitted → GraphBuilt → CodeGenerated → ArtifactsCopied →
//! [NativeBuilt] → [Verified] → CleanedUp → Done`. The first failing stage
//! halts the pipeline; cleanup of the job's working directories is attempted
//! regardless and its own failures are only logged.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::emitter::{EmittedSource, SourceEmitter};
use crate::error::{EmitError, ModelError, ToolError, VerifyError};
use crate::model::{DescriptionFileSource, ModelDescription, ModelSource};
use crate::toolchain::{CodeGenerator, GraphBuilder, NativeBuilder, ToolRunner};
use crate::verify::{VerificationOutcome, Verifier};
use crate::workspace::{Janitor, JobContext};

use super::config::{ConfigError, ToolchainConfig};
use super::job::JobSpec;

/// Pipeline states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    SourceEmitted,
    GraphBuilt,
    CodeGenerated,
    ArtifactsCopied,
    NativeBuilt,
    Verified,
    CleanedUp,
    Done,
}

impl Stage {
    /// Human-readable name of the work that leads to this state.
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Init => "initialization",
            Stage::SourceEmitted => "source emission",
            Stage::GraphBuilt => "expression graph build",
            Stage::CodeGenerated => "code generation",
            Stage::ArtifactsCopied => "artifact copy",
            Stage::NativeBuilt => "native build",
            Stage::Verified => "verification",
            Stage::CleanedUp => "cleanup",
            Stage::Done => "done",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Cause of a stage failure.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Verify(#[from] VerifyError),
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rejected job options.
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Missing or malformed model, detected before any tool runs.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// A pipeline stage failed.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    /// The failed stage, if the error came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

fn at(stage: Stage) -> impl FnOnce(StageError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Duration of one completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Files a run left in the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportArtifacts {
    pub source: Option<PathBuf>,
    pub index_map: Option<PathBuf>,
    pub graph: Option<PathBuf>,
    pub generated_code: Option<PathBuf>,
    pub shared_library: Option<PathBuf>,
    pub import_library: Option<PathBuf>,
}

/// Summary of a pipeline run, written as `<job>_report.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub job: String,
    pub dir_name: String,
    pub status: RunStatus,
    /// Last state reached.
    pub final_stage: Stage,
    pub failed_stage: Option<Stage>,
    pub error: Option<String>,
    pub timings: Vec<StageTiming>,
    pub artifacts: ReportArtifacts,
    pub verification: Option<VerificationOutcome>,
    pub cleanup_warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineReport {
    fn new(ctx: &JobContext) -> Self {
        Self {
            job: ctx.job.clone(),
            dir_name: ctx.dir_name.clone(),
            status: RunStatus::Failed,
            final_stage: Stage::Init,
            failed_stage: None,
            error: None,
            timings: Vec::new(),
            artifacts: ReportArtifacts::default(),
            verification: None,
            cleanup_warnings: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn reached(&mut self, stage: Stage, started: Instant) {
        self.final_stage = stage;
        self.timings.push(StageTiming {
            stage,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        info!(job = %self.job, stage = %stage, "Stage complete");
    }

    /// Returns true if the run completed every requested stage.
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Writes the report as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ToolError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| ToolError::Io {
            op: "serialize",
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        fs::write(path, json).map_err(ToolError::io("write", path))
    }
}

/// Runs derivative-function jobs against a toolchain configuration.
pub struct PipelineOrchestrator {
    config: ToolchainConfig,
    model_source: Box<dyn ModelSource>,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator reading YAML/JSON model descriptions.
    pub fn new(config: ToolchainConfig) -> Self {
        Self {
            config,
            model_source: Box::new(DescriptionFileSource),
        }
    }

    /// Replaces the model parsing collaborator.
    pub fn with_model_source(mut self, source: impl ModelSource + 'static) -> Self {
        self.model_source = Box::new(source);
        self
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }

    /// Runs one job to completion.
    ///
    /// Options and the model are checked before any external tool runs.
    /// Once stages start, the report is written to the output directory
    /// whether the run succeeds or not.
    pub async fn run(&self, job: &JobSpec) -> Result<PipelineReport, PipelineError> {
        self.config.validate()?;
        job.validate().map_err(PipelineError::InvalidJob)?;
        let model = self.model_source.load(&job.model_path)?;

        let roots = self.config.roots();
        let ctx = JobContext::new(
            &job.output_filename,
            roots.clone(),
            &job.output_dir,
            self.config.unique_job_dirs,
        );

        let lock_file = roots.lock_file();
        if lock_file.exists() {
            warn!(
                path = %lock_file.display(),
                "Lock file from a previous build found; another job may be running"
            );
        }

        info!(job = %ctx.job, model = %job.model_path.display(), dir = %ctx.dir_name, "Starting pipeline");
        let mut report = PipelineReport::new(&ctx);
        let result = self.execute(job, &model, &ctx, &mut report).await;

        let started = Instant::now();
        let cleanup = Janitor::new(roots).clean(Some(&ctx.dir_name));
        report.cleanup_warnings = cleanup.warnings;

        match &result {
            Ok(()) => {
                report.reached(Stage::CleanedUp, started);
                report.final_stage = Stage::Done;
                report.status = RunStatus::Succeeded;
                info!(job = %ctx.job, "Pipeline finished");
            }
            Err(e) => {
                report.failed_stage = e.stage();
                report.error = Some(e.to_string());
                error!(job = %ctx.job, error = %e, "Pipeline failed");
            }
        }
        report.finished_at = Some(Utc::now());

        let report_path = ctx.output(&ctx.names.report);
        if let Err(e) = report.save(&report_path) {
            warn!(path = %report_path.display(), error = %e, "Failed to write pipeline report");
        }

        result.map(|()| report)
    }

    async fn execute(
        &self,
        job: &JobSpec,
        model: &ModelDescription,
        ctx: &JobContext,
        report: &mut PipelineReport,
    ) -> Result<(), PipelineError> {
        let runner = ToolRunner::new(self.config.exit_policy, job.verbose);
        let compiler = job.compiler.as_deref().or(self.config.default_compiler.as_deref());

        let started = Instant::now();
        let EmittedSource {
            source_path,
            map_path,
            map,
        } = SourceEmitter
            .emit(
                model,
                &ctx.output_dir,
                &ctx.job,
                &job.layout,
                job.second_order_derivatives,
            )
            .map_err(|e| at(Stage::SourceEmitted)(e.into()))?;
        report.artifacts.source = Some(source_path.clone());
        report.artifacts.index_map = Some(map_path.clone());
        report.reached(Stage::SourceEmitted, started);

        let started = Instant::now();
        let graph_dir = GraphBuilder::new(
            runner,
            &self.config.cmake,
            &self.config.ad_project_dir,
            &self.config.build_type,
        )
        .build(ctx, &source_path, &map_path, compiler)
        .await
        .map_err(|e| at(Stage::GraphBuilt)(e.into()))?;
        report.reached(Stage::GraphBuilt, started);

        let started = Instant::now();
        let generated = CodeGenerator::new(runner, &self.config.python)
            .generate(ctx, &graph_dir, job.second_order_derivatives)
            .await
            .map_err(|e| at(Stage::CodeGenerated)(e.into()))?;
        report.reached(Stage::CodeGenerated, started);

        let started = Instant::now();
        let (graph, code) =
            copy_artifacts(ctx, &graph_dir, &generated).map_err(|e| at(Stage::ArtifactsCopied)(e.into()))?;
        report.artifacts.graph = Some(graph);
        report.artifacts.generated_code = Some(code.clone());
        report.reached(Stage::ArtifactsCopied, started);

        if job.no_dll {
            info!(job = %ctx.job, "Native build skipped");
            return Ok(());
        }

        let started = Instant::now();
        let native = NativeBuilder::new(runner, &self.config.cmake, &self.config.build_type)
            .build(ctx, &code, compiler, !job.no_import_lib)
            .await
            .map_err(|e| at(Stage::NativeBuilt)(e.into()))?;
        report.artifacts.shared_library = Some(native.shared_library.clone());
        report.artifacts.import_library = native.import_library.clone();
        report.reached(Stage::NativeBuilt, started);

        if job.verify_id {
            let started = Instant::now();
            let outcome = Verifier::new(runner, &self.config.verify)
                .verify(&job.model_path, &native.shared_library, &map)
                .await
                .map_err(|e| at(Stage::Verified)(e.into()))?;
            report.verification = Some(outcome);
            report.reached(Stage::Verified, started);
        }

        Ok(())
    }
}

/// Copies `<job>.graph` and `<job>.c` to the output directory.
fn copy_artifacts(ctx: &JobContext, graph_dir: &Path, generated: &Path) -> Result<(PathBuf, PathBuf), ToolError> {
    let graph_src = graph_dir.join(&ctx.names.graph);
    let graph = ctx.output(&ctx.names.graph);
    fs::copy(&graph_src, &graph).map_err(ToolError::io("copy", &graph_src))?;

    let code = ctx.output(&ctx.names.generated_code);
    fs::copy(generated, &code).map_err(ToolError::io("copy", generated))?;
    Ok((graph, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::two_link;
    use tempfile::TempDir;

    struct FixedModel;

    impl ModelSource for FixedModel {
        fn load(&self, _path: &Path) -> Result<ModelDescription, ModelError> {
            Ok(two_link())
        }
    }

    fn config(dir: &TempDir) -> ToolchainConfig {
        ToolchainConfig::new()
            .with_work_root(dir.path().join("work"))
            .with_ad_project_dir(dir.path())
            .with_cmake("ad-forge-no-such-cmake")
    }

    #[test]
    fn test_stage_order_and_names() {
        assert!(Stage::Init < Stage::SourceEmitted);
        assert!(Stage::NativeBuilt < Stage::Verified);
        assert_eq!(Stage::NativeBuilt.to_string(), "native build");
        assert_eq!(Stage::CodeGenerated.to_string(), "code generation");
        assert_eq!(serde_json::to_string(&Stage::GraphBuilt).unwrap(), "\"graph_built\"");
    }

    #[tokio::test]
    async fn test_missing_model_fails_before_tools() {
        let dir = TempDir::new().unwrap();
        let job = JobSpec::new(dir.path().join("missing.yaml"), dir.path().join("out"), "gait");

        let err = PipelineOrchestrator::new(config(&dir)).run(&job).await.unwrap_err();
        assert!(matches!(err, PipelineError::Model(ModelError::NotFound(_))));
        assert!(err.stage().is_none());
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_invalid_job_rejected() {
        let dir = TempDir::new().unwrap();
        let job = JobSpec::new("model.yaml", dir.path().join("out"), "gait")
            .with_no_dll(true)
            .with_verify(true);

        let err = PipelineOrchestrator::new(config(&dir))
            .with_model_source(FixedModel)
            .run(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidJob(_)));
    }

    #[tokio::test]
    async fn test_graph_failure_reports_stage_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let job = JobSpec::new("model.yaml", &out, "gait");
        let orchestrator = PipelineOrchestrator::new(config(&dir)).with_model_source(FixedModel);

        let err = orchestrator.run(&job).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::GraphBuilt));
        assert!(out.join("gait.cpp").is_file());
        assert!(out.join("gait_map.json").is_file());
        assert!(!orchestrator.config().roots().graph.join("gait").exists());

        let report: PipelineReport =
            serde_json::from_str(&fs::read_to_string(out.join("gait_report.json")).unwrap()).unwrap();
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.final_stage, Stage::SourceEmitted);
        assert_eq!(report.failed_stage, Some(Stage::GraphBuilt));
        assert!(report.error.unwrap().contains("AD configure"));
    }
}

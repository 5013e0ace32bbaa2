//! Expression-graph build: compile and run the AD program.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::workspace::JobContext;

use super::process::{absolute, ToolInvocation, ToolRunner};

/// Builds the AD program for a job and records its expression graph.
#[derive(Debug, Clone)]
pub struct GraphBuilder<'a> {
    runner: ToolRunner,
    cmake: &'a str,
    ad_project_dir: &'a Path,
    build_type: &'a str,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(runner: ToolRunner, cmake: &'a str, ad_project_dir: &'a Path, build_type: &'a str) -> Self {
        Self {
            runner,
            cmake,
            ad_project_dir,
            build_type,
        }
    }

    /// Produces `<job>.graph` and a copy of the index map in the job graph
    /// directory, and returns that directory.
    pub async fn build(
        &self,
        ctx: &JobContext,
        source: &Path,
        index_map: &Path,
        compiler: Option<&str>,
    ) -> Result<PathBuf, ToolError> {
        fs::create_dir_all(&ctx.graph_dir).map_err(ToolError::io("create directory", &ctx.graph_dir))?;
        let graph_dir = absolute(&ctx.graph_dir)?;
        let ad_project_dir = absolute(self.ad_project_dir)?;
        let source = absolute(source)?;

        let mut configure = ToolInvocation::new("AD configure", self.cmake)
            .arg("-S")
            .path_arg(&ad_project_dir)
            .arg("-B")
            .path_arg(&graph_dir)
            .arg(format!("-DTARGET_NAME={}", ctx.job))
            .arg(format!("-DSOURCE_FILE={}", source.display()))
            .current_dir(&graph_dir);
        if let Some(compiler) = compiler {
            configure = configure.arg("-G").arg(compiler);
        }
        self.runner.run(&configure).await?;

        let build = ToolInvocation::new("AD build", self.cmake)
            .arg("--build")
            .path_arg(&graph_dir)
            .args(["--config", self.build_type])
            .current_dir(&graph_dir);
        self.runner.run(&build).await?;

        let program = find_program(&graph_dir, &ctx.job)
            .ok_or_else(|| ToolError::MissingArtifact(graph_dir.join(&ctx.job)))?;
        debug!(program = %program.display(), "Found AD program");

        let record = ToolInvocation::new("AD program", program.to_string_lossy().to_string())
            .current_dir(&graph_dir);
        self.runner.run(&record).await?;

        let graph = ctx.in_graph_dir(&ctx.names.graph);
        if !graph.is_file() {
            return Err(ToolError::MissingArtifact(graph));
        }

        let map_copy = ctx.in_graph_dir(&ctx.names.index_map);
        fs::copy(index_map, &map_copy).map_err(ToolError::io("copy", index_map))?;

        info!(job = %ctx.job, graph = %graph.display(), "Expression graph recorded");
        Ok(ctx.graph_dir.clone())
    }
}

/// Locates the built executable; multi-config generators nest it one level deeper.
fn find_program(dir: &Path, job: &str) -> Option<PathBuf> {
    let names = [job.to_string(), format!("{job}.exe")];
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(3)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .find(|e| names.iter().any(|n| e.file_name() == n.as_str()))
        .map(|e| e.into_path())
}

//! Code generation from a recorded expression graph.

use std::fs;
use std::path::{Path, PathBuf};

use tera::{Context, Tera};
use tracing::info;

use crate::emitter::IndexMap;
use crate::error::ToolError;
use crate::workspace::JobContext;

use super::process::{absolute, ToolInvocation, ToolRunner};
use super::templates::CODEGEN_DRIVER_TEMPLATE;

/// Runs the derivative code generator over `<job>.graph`.
#[derive(Debug, Clone)]
pub struct CodeGenerator<'a> {
    runner: ToolRunner,
    python: &'a str,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(runner: ToolRunner, python: &'a str) -> Self {
        Self { runner, python }
    }

    /// Produces `<job>.c` in `graph_dir` and returns its path.
    ///
    /// The driver script is written to the work root and left there; the
    /// janitor removes it.
    pub async fn generate(
        &self,
        ctx: &JobContext,
        graph_dir: &Path,
        second_order: bool,
    ) -> Result<PathBuf, ToolError> {
        let map_path = graph_dir.join(&ctx.names.index_map);
        let map = IndexMap::load(&map_path)
            .map_err(|e| ToolError::IndexMap(format!("{}: {}", map_path.display(), e)))?;

        let script = render_driver(ctx, &map, second_order)?;
        let script_path = ctx.roots.leftover_script();
        if let Some(parent) = script_path.parent() {
            fs::create_dir_all(parent).map_err(ToolError::io("create directory", parent))?;
        }
        fs::write(&script_path, script).map_err(ToolError::io("write", &script_path))?;

        let invocation = ToolInvocation::new("code generator", self.python)
            .path_arg(&absolute(&script_path)?)
            .current_dir(graph_dir);
        self.runner.run(&invocation).await?;

        let generated = graph_dir.join(&ctx.names.generated_code);
        if !generated.is_file() {
            return Err(ToolError::MissingArtifact(generated));
        }
        info!(job = %ctx.job, code = %generated.display(), second_order, "Derivative code generated");
        Ok(generated)
    }
}

fn render_driver(ctx: &JobContext, map: &IndexMap, second_order: bool) -> Result<String, ToolError> {
    let mut context = Context::new();
    context.insert("job", &ctx.job);
    context.insert("graph_file", &ctx.names.graph);
    context.insert("generated_code", &ctx.names.generated_code);
    context.insert("n_inputs", &map.n_inputs);
    context.insert("second_order", &second_order);
    Ok(Tera::one_off(CODEGEN_DRIVER_TEMPLATE, &context, false)?)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{resolve, FunctionLayout};
    use crate::model::fixtures::two_link;
    use crate::workspace::WorkRoots;
    use tempfile::TempDir;

    fn map() -> IndexMap {
        let model = two_link();
        let layout = FunctionLayout::default();
        let resolved = resolve(&model, &layout).unwrap();
        IndexMap::build(&resolved, &layout, false)
    }

    #[test]
    fn test_driver_first_order() {
        let ctx = JobContext::new("gait", WorkRoots::new("/work"), "/out", false);
        let script = render_driver(&ctx, &map(), false).unwrap();
        assert!(script.contains("ca.Function.load(\"gait.graph\")"));
        assert!(script.contains("ca.CodeGenerator(\"gait.c\""));
        assert!(script.contains("ca.MX.sym(\"x\", 6)"));
        assert!(!script.contains("jacobian().jacobian()"));
    }

    #[test]
    fn test_driver_second_order() {
        let ctx = JobContext::new("gait", WorkRoots::new("/work"), "/out", false);
        let script = render_driver(&ctx, &map(), true).unwrap();
        assert!(script.contains("cg.add(f.jacobian().jacobian())"));
    }

    #[tokio::test]
    async fn test_missing_map_is_reported() {
        let dir = TempDir::new().unwrap();
        let ctx = JobContext::new("gait", WorkRoots::new(dir.path()), dir.path(), false);
        let err = CodeGenerator::new(ToolRunner::default(), "python3")
            .generate(&ctx, dir.path(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::IndexMap(_)));
        assert!(!ctx.roots.leftover_script().exists());
    }
}

//! Native build of the generated derivative code.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ToolError;
use crate::workspace::JobContext;

use super::process::{absolute, ToolInvocation, ToolRunner};
use super::templates::NATIVE_CMAKELISTS;

/// Build tree directory inside the staged native directory.
const BUILD_DIR: &str = "build";

/// Libraries copied to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArtifacts {
    pub shared_library: PathBuf,
    pub import_library: Option<PathBuf>,
}

/// Compiles `<job>.c` into a shared library and installs it.
#[derive(Debug, Clone)]
pub struct NativeBuilder<'a> {
    runner: ToolRunner,
    cmake: &'a str,
    build_type: &'a str,
}

impl<'a> NativeBuilder<'a> {
    pub fn new(runner: ToolRunner, cmake: &'a str, build_type: &'a str) -> Self {
        Self {
            runner,
            cmake,
            build_type,
        }
    }

    /// Configures, builds and installs, then copies the libraries to the
    /// output directory. A failed configure never runs the build.
    pub async fn build(
        &self,
        ctx: &JobContext,
        generated_code: &Path,
        compiler: Option<&str>,
        import_library: bool,
    ) -> Result<NativeArtifacts, ToolError> {
        self.stage(ctx, generated_code)?;

        let install_dir = absolute(&ctx.install_dir)?;
        let mut configure = ToolInvocation::new("native configure", self.cmake)
            .args(["-S", ".", "-B", BUILD_DIR])
            .arg(format!("-DTARGET_NAME={}", ctx.job))
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", install_dir.display()))
            .current_dir(&ctx.native_dir);
        if let Some(compiler) = compiler {
            configure = configure.arg("-G").arg(compiler);
        }
        self.runner.run(&configure).await?;

        let build = ToolInvocation::new("native build", self.cmake)
            .args(["--build", BUILD_DIR, "--config", self.build_type, "--target", "install"])
            .current_dir(&ctx.native_dir);
        self.runner.run(&build).await?;

        self.collect(ctx, import_library)
    }

    fn stage(&self, ctx: &JobContext, generated_code: &Path) -> Result<(), ToolError> {
        for dir in [&ctx.native_dir, &ctx.install_dir] {
            fs::create_dir_all(dir).map_err(ToolError::io("create directory", dir))?;
        }

        let cmakelists = ctx.native_dir.join("CMakeLists.txt");
        fs::write(&cmakelists, NATIVE_CMAKELISTS).map_err(ToolError::io("write", &cmakelists))?;

        let staged = ctx.native_dir.join(&ctx.names.generated_code);
        fs::copy(generated_code, &staged).map_err(ToolError::io("copy", generated_code))?;
        debug!(dir = %ctx.native_dir.display(), "Staged native build tree");
        Ok(())
    }

    fn collect(&self, ctx: &JobContext, import_library: bool) -> Result<NativeArtifacts, ToolError> {
        fs::create_dir_all(&ctx.output_dir).map_err(ToolError::io("create directory", &ctx.output_dir))?;

        let shared = [
            ctx.install_dir.join("bin").join(&ctx.names.shared_library),
            ctx.install_dir.join("lib").join(&ctx.names.shared_library),
        ]
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| ToolError::MissingArtifact(ctx.install_dir.join("bin").join(&ctx.names.shared_library)))?;
        let shared_library = copy_to(&shared, &ctx.output(&ctx.names.shared_library))?;

        let import_library = if import_library {
            let installed = ctx.install_dir.join("lib").join(&ctx.names.import_library);
            if !installed.is_file() {
                return Err(ToolError::MissingArtifact(installed));
            }
            Some(copy_to(&installed, &ctx.output(&ctx.names.import_library))?)
        } else {
            None
        };

        info!(
            job = %ctx.job,
            library = %shared_library.display(),
            import_library = import_library.is_some(),
            "Native library installed"
        );
        Ok(NativeArtifacts {
            shared_library,
            import_library,
        })
    }
}

fn copy_to(from: &Path, to: &Path) -> Result<PathBuf, ToolError> {
    fs::copy(from, to).map_err(ToolError::io("copy", from))?;
    Ok(to.to_path_buf())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkRoots;
    use tempfile::TempDir;

    fn context(dir: &TempDir) -> JobContext {
        JobContext::new("gait", WorkRoots::new(dir.path().join("work")), dir.path().join("out"), false)
    }

    #[test]
    fn test_stage_writes_build_tree() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let code = dir.path().join("gait.c");
        fs::write(&code, "int gait;").unwrap();

        NativeBuilder::new(ToolRunner::default(), "cmake", "Release")
            .stage(&ctx, &code)
            .unwrap();

        assert!(ctx.install_dir.is_dir());
        let cmakelists = fs::read_to_string(ctx.native_dir.join("CMakeLists.txt")).unwrap();
        assert!(cmakelists.contains("add_library(${TARGET_NAME} SHARED"));
        assert_eq!(fs::read_to_string(ctx.native_dir.join("gait.c")).unwrap(), "int gait;");
    }

    #[test]
    fn test_collect_falls_back_to_lib_dir() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let lib = ctx.install_dir.join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join(&ctx.names.shared_library), "so").unwrap();

        let artifacts = NativeBuilder::new(ToolRunner::default(), "cmake", "Release")
            .collect(&ctx, false)
            .unwrap();
        assert_eq!(artifacts.shared_library, ctx.output(&ctx.names.shared_library));
        assert!(artifacts.shared_library.is_file());
        assert!(artifacts.import_library.is_none());
    }

    #[test]
    fn test_collect_requires_import_library() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let bin = ctx.install_dir.join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(&ctx.names.shared_library), "so").unwrap();

        let err = NativeBuilder::new(ToolRunner::default(), "cmake", "Release")
            .collect(&ctx, true)
            .unwrap_err();
        assert!(matches!(err, ToolError::MissingArtifact(p) if p.ends_with(&ctx.names.import_library)));
    }

    #[tokio::test]
    async fn test_missing_cmake_fails_before_build() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir);
        let code = dir.path().join("gait.c");
        fs::write(&code, "").unwrap();

        let err = NativeBuilder::new(ToolRunner::default(), "ad-forge-no-such-cmake", "Release")
            .build(&ctx, &code, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { ref tool, .. } if tool == "native configure"));
        assert!(!ctx.native_dir.join(BUILD_DIR).exists());
    }
}

//! Job requests: what to generate and where.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::emitter::FunctionLayout;
use crate::workspace::validate_job_name;

/// One request to generate an external function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Model description file.
    pub model_path: PathBuf,
    /// Directory receiving all job outputs.
    pub output_dir: PathBuf,
    /// Output filename stem; also names the job and its working directories.
    pub output_filename: String,
    /// Build-system generator identifying the native toolchain.
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    /// Compare the compiled function against reference inverse dynamics.
    #[serde(default)]
    pub verify_id: bool,
    /// Also emit second-order derivative code.
    #[serde(default)]
    pub second_order_derivatives: bool,
    /// Skip the native build.
    #[serde(default)]
    pub no_dll: bool,
    /// Do not copy the import/link library.
    #[serde(default)]
    pub no_import_lib: bool,
    #[serde(flatten)]
    pub layout: FunctionLayout,
}

impl JobSpec {
    /// Creates a job with default flags and layout.
    pub fn new(
        model_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        output_filename: impl Into<String>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            output_dir: output_dir.into(),
            output_filename: output_filename.into(),
            compiler: None,
            verbose: false,
            verify_id: false,
            second_order_derivatives: false,
            no_dll: false,
            no_import_lib: false,
            layout: FunctionLayout::default(),
        }
    }

    /// Reads a job from YAML.
    pub fn from_yaml_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read job file '{}': {}", path.display(), e))?;
        serde_yaml::from_str(&content)
            .map_err(|e| format!("failed to parse job file '{}': {}", path.display(), e))
    }

    /// Sets the compiler identifier.
    pub fn with_compiler(mut self, compiler: impl Into<String>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    /// Sets the function layout.
    pub fn with_layout(mut self, layout: FunctionLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Skips or enables the native build.
    pub fn with_no_dll(mut self, no_dll: bool) -> Self {
        self.no_dll = no_dll;
        self
    }

    /// Skips or enables copying the import library.
    pub fn with_no_import_lib(mut self, no_import_lib: bool) -> Self {
        self.no_import_lib = no_import_lib;
        self
    }

    /// Enables or disables verification.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify_id = verify;
        self
    }

    /// Enables or disables second-order derivatives.
    pub fn with_second_order(mut self, second_order: bool) -> Self {
        self.second_order_derivatives = second_order;
        self
    }

    /// Enables or disables verbose tool output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Checks the request before any tool runs.
    pub fn validate(&self) -> Result<(), String> {
        if !validate_job_name(&self.output_filename) {
            return Err(format!(
                "output filename '{}' must be a C identifier",
                self.output_filename
            ));
        }
        if self.verify_id && self.no_dll {
            return Err("verification needs the compiled library; drop no_dll or verify_id".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err("output directory cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_job_defaults() {
        let job = JobSpec::new("model.yaml", "out", "gait");
        assert!(!job.no_dll);
        assert!(!job.verify_id);
        assert!(job.layout.joints_order.is_none());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_job_validation() {
        assert!(JobSpec::new("m.yaml", "out", "bad-name").validate().is_err());
        assert!(JobSpec::new("m.yaml", "out", "gait")
            .with_no_dll(true)
            .with_verify(true)
            .validate()
            .is_err());
        assert!(JobSpec::new("m.yaml", "", "gait").validate().is_err());
    }

    #[test]
    fn test_job_yaml_flattens_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.yaml");
        fs::write(
            &path,
            r#"
model_path: models/gait.yaml
output_dir: out
output_filename: gait
compiler: "Visual Studio 17 2022"
export_grfs: true
body_forces: [torso]
coordinates_order: [q1, q2]
"#,
        )
        .unwrap();

        let job = JobSpec::from_yaml_file(&path).unwrap();
        assert_eq!(job.compiler.as_deref(), Some("Visual Studio 17 2022"));
        assert!(job.layout.export_grfs);
        assert!(!job.layout.export_grms);
        assert_eq!(job.layout.body_forces, vec!["torso"]);
        assert_eq!(
            job.layout.coordinates_order,
            Some(vec!["q1".to_string(), "q2".to_string()])
        );
    }
}

//! Working-directory layout of build jobs.
//!
//! All paths a job touches are computed once into a [`JobContext`] and
//! passed explicitly to every stage.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

/// Root for expression-graph builds.
pub const GRAPH_ROOT: &str = "build-ExpressionGraph";
/// Root for native builds.
pub const NATIVE_ROOT: &str = "build-ExternalFunction";
/// Root for installed native-build artifacts.
pub const INSTALL_ROOT: &str = "install-ExternalFunction";
/// Lock file name, under `<install-root>/bin`.
pub const LOCK_FILE: &str = "lockFile.txt";
/// Code-generation driver script left in the work root.
pub const CODEGEN_DRIVER: &str = "codegen_driver.py";

static JOB_NAME: OnceLock<Regex> = OnceLock::new();

/// Returns true if `job` can be used as a file stem, C symbol and build target.
pub fn validate_job_name(job: &str) -> bool {
    JOB_NAME
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("job name pattern is valid"))
        .is_match(job)
}

/// The three working-directory roots under a common work root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRoots {
    pub work_root: PathBuf,
    pub graph: PathBuf,
    pub native: PathBuf,
    pub install: PathBuf,
}

impl WorkRoots {
    /// Derives the roots from `work_root`.
    pub fn new(work_root: impl Into<PathBuf>) -> Self {
        let work_root = work_root.into();
        Self {
            graph: work_root.join(GRAPH_ROOT),
            native: work_root.join(NATIVE_ROOT),
            install: work_root.join(INSTALL_ROOT),
            work_root,
        }
    }

    /// The three roots in cleanup order.
    pub fn all(&self) -> [&Path; 3] {
        [&self.graph, &self.native, &self.install]
    }

    /// Sentinel left behind by an interrupted external build.
    pub fn lock_file(&self) -> PathBuf {
        self.install.join("bin").join(LOCK_FILE)
    }

    /// Code-generation driver script path.
    pub fn leftover_script(&self) -> PathBuf {
        self.work_root.join(CODEGEN_DRIVER)
    }
}

/// File names of the artifacts produced for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNames {
    pub source: String,
    pub index_map: String,
    pub graph: String,
    pub generated_code: String,
    pub shared_library: String,
    pub import_library: String,
    pub report: String,
}

impl ArtifactNames {
    pub fn new(job: &str) -> Self {
        let import_library = if cfg!(windows) {
            format!("{job}.lib")
        } else {
            format!("lib{job}.a")
        };
        Self {
            source: format!("{job}.cpp"),
            index_map: format!("{job}_map.json"),
            graph: format!("{job}.graph"),
            generated_code: format!("{job}.c"),
            shared_library: format!(
                "{}{job}{}",
                std::env::consts::DLL_PREFIX,
                std::env::consts::DLL_SUFFIX
            ),
            import_library,
            report: format!("{job}_report.json"),
        }
    }
}

/// Every path used by one build job.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Job name, also the output filename stem.
    pub job: String,
    /// Name of the job's subdirectory in each root.
    pub dir_name: String,
    pub roots: WorkRoots,
    pub output_dir: PathBuf,
    pub graph_dir: PathBuf,
    pub native_dir: PathBuf,
    pub install_dir: PathBuf,
    pub names: ArtifactNames,
}

impl JobContext {
    /// Builds the context. With `unique_dirs` the job subdirectories get a
    /// random suffix so concurrent jobs with the same name do not collide.
    pub fn new(job: &str, roots: WorkRoots, output_dir: impl Into<PathBuf>, unique_dirs: bool) -> Self {
        let dir_name = if unique_dirs {
            let suffix = Uuid::new_v4().simple().to_string();
            format!("{job}-{}", &suffix[..8])
        } else {
            job.to_string()
        };
        Self {
            job: job.to_string(),
            graph_dir: roots.graph.join(&dir_name),
            native_dir: roots.native.join(&dir_name),
            install_dir: roots.install.join(&dir_name),
            dir_name,
            roots,
            output_dir: output_dir.into(),
            names: ArtifactNames::new(job),
        }
    }

    /// Path of an artifact in the output directory.
    pub fn output(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Path of an artifact in the graph directory.
    pub fn in_graph_dir(&self, file_name: &str) -> PathBuf {
        self.graph_dir.join(file_name)
    }
}

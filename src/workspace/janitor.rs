//! Removal of job working directories and leftover build state.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::layout::WorkRoots;

/// What a cleanup pass removed and what it could not.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Directories and files that were deleted.
    pub removed: Vec<PathBuf>,
    /// Failures other than "not found"; never fatal.
    pub warnings: Vec<String>,
}

impl CleanupReport {
    /// Returns true if nothing failed.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Deletes job subdirectories under the working-directory roots.
#[derive(Debug, Clone)]
pub struct Janitor {
    roots: WorkRoots,
}

impl Janitor {
    pub fn new(roots: WorkRoots) -> Self {
        Self { roots }
    }

    /// Removes job subdirectories, then the lock file and driver script.
    ///
    /// With `filter` only subdirectories with exactly that name are removed.
    /// Missing paths are ignored; other failures are logged and collected.
    pub fn clean(&self, filter: Option<&str>) -> CleanupReport {
        let mut report = CleanupReport::default();

        for root in self.roots.all() {
            self.sweep(root, filter, &mut report);
        }

        remove_file(&self.roots.lock_file(), &mut report);
        remove_file(&self.roots.leftover_script(), &mut report);

        info!(
            filter = filter.unwrap_or("*"),
            removed = report.removed.len(),
            warnings = report.warnings.len(),
            "Cleanup finished"
        );
        report
    }

    fn sweep(&self, root: &Path, filter: Option<&str>, report: &mut CleanupReport) {
        for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let not_found = e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound);
                    if !not_found {
                        warn!(root = %root.display(), error = %e, "Failed to scan working directory");
                        report.warnings.push(format!("scan {}: {}", root.display(), e));
                    }
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if name == "." || name == ".." {
                continue;
            }
            if let Some(filter) = filter {
                if name != filter {
                    continue;
                }
            }

            remove_dir(entry.path(), report);
        }
    }
}

fn remove_dir(path: &Path, report: &mut CleanupReport) {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed directory");
            report.removed.push(path.to_path_buf());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove directory");
            report.warnings.push(format!("remove {}: {}", path.display(), e));
        }
    }
}

fn remove_file(path: &Path, report: &mut CleanupReport) {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed file");
            report.removed.push(path.to_path_buf());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove file");
            report.warnings.push(format!("remove {}: {}", path.display(), e));
        }
    }
}

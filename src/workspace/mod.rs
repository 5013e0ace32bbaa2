//! Job working directories.
//!
//! - [`layout`]: the explicit per-job path context
//! - [`janitor`]: best-effort removal of job directories and leftovers

pub mod janitor;
pub mod layout;

pub use janitor::{CleanupReport, Janitor};
pub use layout::{validate_job_name, ArtifactNames, JobContext, WorkRoots};

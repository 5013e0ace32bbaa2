//! Source emission.
//!
//! Turns a model description and a requested [`FunctionLayout`] into the two
//! artifacts that fix the compiled function's interface: the AD source file
//! and the [`IndexMap`].

pub mod index_map;
pub mod layout;
pub mod source;
pub mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::EmitError;
use crate::model::ModelDescription;
use crate::workspace::{validate_job_name, ArtifactNames};

pub use index_map::{zero_based, CoordinateOffsets, IndexMap, SideOffsets};
pub use layout::{resolve, FunctionLayout, ResolvedLayout};
pub use source::render_source;

/// Files written by the emitter.
#[derive(Debug, Clone)]
pub struct EmittedSource {
    pub source_path: PathBuf,
    pub map_path: PathBuf,
    pub map: IndexMap,
}

/// Writes the AD source file and index map for one job.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceEmitter;

impl SourceEmitter {
    /// Emits `<job>.cpp` and `<job>_map.json` into `output_dir`.
    pub fn emit(
        &self,
        model: &ModelDescription,
        output_dir: &Path,
        job: &str,
        layout: &FunctionLayout,
        second_order: bool,
    ) -> Result<EmittedSource, EmitError> {
        if !validate_job_name(job) {
            return Err(EmitError::InvalidJobName(job.to_string()));
        }

        let names = ArtifactNames::new(job);
        let resolved = resolve(model, layout)?;
        let map = IndexMap::build(&resolved, layout, second_order);
        let source = render_source(model, &resolved, &map, job, &names.graph)?;

        fs::create_dir_all(output_dir).map_err(EmitError::io("create directory", output_dir))?;

        let source_path = output_dir.join(&names.source);
        fs::write(&source_path, source).map_err(EmitError::io("write", &source_path))?;
        debug!(path = %source_path.display(), "Wrote AD source");

        let map_path = output_dir.join(&names.index_map);
        map.save(&map_path)?;

        info!(
            job = job,
            coordinates = map.n_coordinates,
            inputs = map.n_inputs,
            outputs = map.n_outputs,
            "Emitted source and index map"
        );

        Ok(EmittedSource {
            source_path,
            map_path,
            map,
        })
    }
}

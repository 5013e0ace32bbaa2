//! Model file loading.
//!
//! Model parsing is a collaborator of the pipeline: anything implementing
//! [`ModelSource`] can supply a [`ModelDescription`]. The built-in
//! [`DescriptionFileSource`] reads YAML or JSON model descriptions.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::ModelError;

use super::types::ModelDescription;

/// Supplies a model description for a model file path.
pub trait ModelSource: Send + Sync {
    /// Loads and validates the model at `path`.
    fn load(&self, path: &Path) -> Result<ModelDescription, ModelError>;
}

/// Reads `.yaml`, `.yml` and `.json` model descriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptionFileSource;

impl ModelSource for DescriptionFileSource {
    fn load(&self, path: &Path) -> Result<ModelDescription, ModelError> {
        if !path.is_file() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let content = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let model: ModelDescription = match extension.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| ModelError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            "json" => serde_json::from_str(&content).map_err(|e| ModelError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            _ => {
                return Err(ModelError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    extension,
                })
            }
        };

        model.validate()?;
        debug!(
            model = %model.name,
            bodies = model.bodies.len(),
            joints = model.joints.len(),
            contacts = model.contacts.len(),
            "Loaded model description"
        );
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MODEL_YAML: &str = r#"
name: two_link
bodies:
  - name: link1
    mass: 1.0
  - name: link2
    mass: 1.0
joints:
  - name: j1
    kind: pin
    parent: ground
    child: link1
    coordinates:
      - name: q1
  - name: j2
    kind: pin
    parent: link1
    child: link2
    coordinates:
      - name: q2
"#;

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.yaml");
        fs::write(&path, MODEL_YAML).unwrap();

        let model = DescriptionFileSource.load(&path).unwrap();
        assert_eq!(model.name, "two_link");
        assert_eq!(model.joints.len(), 2);
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let model: ModelDescription = serde_yaml::from_str(MODEL_YAML).unwrap();
        fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        let loaded = DescriptionFileSource.load(&path).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn test_missing_file() {
        let err = DescriptionFileSource
            .load(Path::new("/nonexistent/model.yaml"))
            .unwrap_err();
        assert!(matches!(err, ModelError::NotFound(_)));
    }

    #[test]
    fn test_osim_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.osim");
        fs::write(&path, "<OpenSimDocument/>").unwrap();

        let err = DescriptionFileSource.load(&path).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.yaml");
        fs::write(&path, "name: [unterminated").unwrap();

        let err = DescriptionFileSource.load(&path).unwrap_err();
        assert!(matches!(err, ModelError::Parse { .. }));
    }
}

//! Naming conventions applied to model components.
//!
//! Contact elements are grouped into left and right feet by name affix, and
//! patella coordinates/bodies are excluded from inverse dynamics.

use serde::{Deserialize, Serialize};

/// Body side of a contact element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Right,
    Left,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Right => write!(f, "right"),
            Side::Left => write!(f, "left"),
        }
    }
}

const RIGHT_PREFIXES: [&str; 2] = ["r_", "R_"];
const RIGHT_SUFFIXES: [&str; 2] = ["_r", "_R"];
const LEFT_PREFIXES: [&str; 2] = ["l_", "L_"];
const LEFT_SUFFIXES: [&str; 2] = ["_l", "_L"];

/// Classifies a contact element by name prefix or suffix.
///
/// Returns `None` for names carrying no side affix; such elements never
/// contribute to the aggregated left/right outputs.
pub fn classify_side(name: &str) -> Option<Side> {
    let matches = |prefixes: &[&str], suffixes: &[&str]| {
        prefixes.iter().any(|p| name.starts_with(p)) || suffixes.iter().any(|s| name.ends_with(s))
    };

    if matches(&RIGHT_PREFIXES, &RIGHT_SUFFIXES) {
        Some(Side::Right)
    } else if matches(&LEFT_PREFIXES, &LEFT_SUFFIXES) {
        Some(Side::Left)
    } else {
        None
    }
}

/// Returns true for names of patella bodies or coordinates.
pub fn is_patella(name: &str) -> bool {
    name.to_ascii_lowercase().contains("patella")
}

//! Index-mapping artifact.
//!
//! Maps semantic names (coordinates, bodies, contact elements, aggregated
//! outputs) to offsets in the generated function's flat input and output
//! vectors. All offsets are 1-based ordinals; use [`zero_based`] to index a
//! slice.
//!
//! Input vector layout:
//!
//! ```text
//! q1 qd1 q2 qd2 ... qN qdN | qdd1 ... qddN | force bodies (3 each) | moment bodies (3 each)
//! ```
//!
//! Output vector layout (blocks present only when requested):
//!
//! ```text
//! residuals (N) | GRF right, left | GRM right, left | per-element GRF | contact powers | positions | velocities
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EmitError;
use crate::model::{classify_side, Side};

use super::layout::{FunctionLayout, ResolvedLayout};

/// Converts a 1-based offset into a slice index.
pub fn zero_based(offset: usize) -> usize {
    offset.saturating_sub(1)
}

/// Input offsets of one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateOffsets {
    pub position: usize,
    pub velocity: usize,
    pub acceleration: usize,
}

impl CoordinateOffsets {
    /// Offsets of the coordinate at 1-based `ordinal` among `count` coordinates.
    pub fn for_ordinal(ordinal: usize, count: usize) -> Self {
        Self {
            position: 2 * ordinal - 1,
            velocity: 2 * ordinal,
            acceleration: ordinal + 2 * count,
        }
    }
}

/// Aggregated right/left output offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideOffsets {
    pub right: [usize; 3],
    pub left: [usize; 3],
}

/// The index-mapping artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMap {
    pub n_coordinates: usize,
    pub n_inputs: usize,
    pub n_outputs: usize,
    /// Coordinate names in function order.
    pub coordinate_order: Vec<String>,
    pub coordinates: BTreeMap<String, CoordinateOffsets>,
    pub residuals: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub body_forces: BTreeMap<String, [usize; 3]>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub body_moments: BTreeMap<String, [usize; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grfs: Option<SideOffsets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grms: Option<SideOffsets>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub separate_grfs: BTreeMap<String, [usize; 3]>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contact_powers: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub positions: BTreeMap<String, [usize; 3]>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub velocities: BTreeMap<String, [usize; 3]>,
    /// Contact elements contributing to each aggregated side.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contact_sides: BTreeMap<Side, Vec<String>>,
    /// Whether second-order derivative code was requested.
    #[serde(default)]
    pub second_order: bool,
}

/// Hands out consecutive 1-based offsets.
struct Cursor(usize);

impl Cursor {
    fn next(&mut self) -> usize {
        self.0 += 1;
        self.0
    }

    fn next3(&mut self) -> [usize; 3] {
        [self.next(), self.next(), self.next()]
    }
}

impl IndexMap {
    /// Computes the input/output layout for a resolved function layout.
    pub fn build(resolved: &ResolvedLayout<'_>, layout: &FunctionLayout, second_order: bool) -> Self {
        let count = resolved.coordinates.len();

        let coordinates = resolved
            .coordinates
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), CoordinateOffsets::for_ordinal(i + 1, count)))
            .collect();

        let mut inputs = Cursor(3 * count);
        let body_forces = layout
            .body_forces
            .iter()
            .map(|b| (b.clone(), inputs.next3()))
            .collect();
        let body_moments = layout
            .body_moments
            .iter()
            .map(|b| (b.clone(), inputs.next3()))
            .collect();

        let mut outputs = Cursor(0);
        let residuals = resolved
            .coordinates
            .iter()
            .map(|name| (name.clone(), outputs.next()))
            .collect();

        let grfs = layout.export_grfs.then(|| SideOffsets {
            right: outputs.next3(),
            left: outputs.next3(),
        });
        let grms = layout.export_grms.then(|| SideOffsets {
            right: outputs.next3(),
            left: outputs.next3(),
        });

        let mut separate_grfs = BTreeMap::new();
        if layout.export_separate_grfs {
            for contact in &resolved.contacts {
                separate_grfs.insert(contact.name.clone(), outputs.next3());
            }
        }

        let mut contact_powers = BTreeMap::new();
        if layout.export_contact_powers {
            for contact in &resolved.contacts {
                contact_powers.insert(contact.name.clone(), outputs.next());
            }
        }

        let positions = layout
            .export_positions
            .iter()
            .map(|b| (b.clone(), outputs.next3()))
            .collect();
        let velocities = layout
            .export_velocities
            .iter()
            .map(|b| (b.clone(), outputs.next3()))
            .collect();

        let mut contact_sides: BTreeMap<Side, Vec<String>> = BTreeMap::new();
        if layout.export_grfs || layout.export_grms {
            for contact in &resolved.contacts {
                if let Some(side) = classify_side(&contact.name) {
                    contact_sides.entry(side).or_default().push(contact.name.clone());
                }
            }
        }

        Self {
            n_coordinates: count,
            n_inputs: inputs.0,
            n_outputs: outputs.0,
            coordinate_order: resolved.coordinates.clone(),
            coordinates,
            residuals,
            body_forces,
            body_moments,
            grfs,
            grms,
            separate_grfs,
            contact_powers,
            positions,
            velocities,
            contact_sides,
            second_order,
        }
    }

    /// Writes the map as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), EmitError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(EmitError::io("write", path))
    }

    /// Reads a map previously written by [`IndexMap::save`].
    pub fn load(path: &Path) -> Result<Self, EmitError> {
        let content = fs::read_to_string(path).map_err(EmitError::io("read", path))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Residual output offsets in coordinate order.
    pub fn residual_offsets(&self) -> Vec<usize> {
        self.coordinate_order
            .iter()
            .filter_map(|name| self.residuals.get(name).copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::layout::resolve;
    use crate::model::fixtures::{leg_with_patella, two_link};
    use tempfile::TempDir;

    #[test]
    fn test_coordinate_offset_formula() {
        for count in 1..8 {
            for ordinal in 1..=count {
                let offsets = CoordinateOffsets::for_ordinal(ordinal, count);
                assert_eq!(offsets.position, 2 * ordinal - 1);
                assert_eq!(offsets.velocity, 2 * ordinal);
                assert_eq!(offsets.acceleration, ordinal + 2 * count);
            }
        }
    }

    #[test]
    fn test_two_link_map() {
        let model = two_link();
        let layout = FunctionLayout::new();
        let map = IndexMap::build(&resolve(&model, &layout).unwrap(), &layout, false);

        assert_eq!(map.n_coordinates, 2);
        assert_eq!(map.coordinates.len(), 2);
        assert_eq!(map.n_inputs, 6);
        assert_eq!(map.n_outputs, 2);
        assert_eq!(
            map.coordinates["q2"],
            CoordinateOffsets {
                position: 3,
                velocity: 4,
                acceleration: 6
            }
        );
        assert!(map.grfs.is_none());
        assert_eq!(map.residual_offsets(), vec![1, 2]);
    }

    #[test]
    fn test_extra_inputs_follow_accelerations() {
        let model = two_link();
        let layout = FunctionLayout::new()
            .with_body_force("link2")
            .with_body_moment("link1");
        let map = IndexMap::build(&resolve(&model, &layout).unwrap(), &layout, false);

        assert_eq!(map.body_forces["link2"], [7, 8, 9]);
        assert_eq!(map.body_moments["link1"], [10, 11, 12]);
        assert_eq!(map.n_inputs, 12);
    }

    #[test]
    fn test_contact_outputs() {
        let model = leg_with_patella();
        let layout = FunctionLayout::new()
            .with_grfs(true)
            .with_grms(true)
            .with_separate_grfs(true)
            .with_contact_powers(true)
            .with_position("calcn_r");
        let map = IndexMap::build(&resolve(&model, &layout).unwrap(), &layout, true);

        assert_eq!(map.residuals.len(), 3);
        let grfs = map.grfs.unwrap();
        assert_eq!(grfs.right, [4, 5, 6]);
        assert_eq!(grfs.left, [7, 8, 9]);
        assert_eq!(map.grms.unwrap().right, [10, 11, 12]);
        assert_eq!(map.separate_grfs["R_heel"], [16, 17, 18]);
        assert_eq!(map.separate_grfs.len(), 3);
        assert_eq!(map.contact_powers.len(), 3);
        assert_eq!(map.contact_powers["R_heel"], 25);
        assert_eq!(map.positions["calcn_r"], [28, 29, 30]);
        assert_eq!(map.n_outputs, 30);

        assert_eq!(map.contact_sides[&Side::Right], vec!["R_heel"]);
        assert_eq!(map.contact_sides[&Side::Left], vec!["toe_l"]);
        assert!(map
            .contact_sides
            .values()
            .all(|names| !names.iter().any(|n| n == "contact1")));
        assert!(map.second_order);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("map.json");
        let model = two_link();
        let layout = FunctionLayout::new();
        let map = IndexMap::build(&resolve(&model, &layout).unwrap(), &layout, false);

        map.save(&path).unwrap();
        let json = fs::read_to_string(&path).unwrap();
        assert!(!json.contains("grfs"));
        assert_eq!(IndexMap::load(&path).unwrap(), map);
    }
}

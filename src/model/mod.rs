//! Musculoskeletal model descriptions.
//!
//! This module defines the model types consumed by the source emitter,
//! the [`ModelSource`] seam used to load them, and the naming rules the
//! pipeline applies to model components (contact side, patella exclusion).

pub mod loader;
pub mod side;
pub mod types;

use std::collections::HashSet;

pub use loader::{DescriptionFileSource, ModelSource};
pub use side::{classify_side, is_patella, Side};
pub use types::{
    AxisKind, Body, ContactElement, Coordinate, Joint, JointKind, ModelDescription,
    TransformAxis, GROUND,
};

use crate::error::ModelError;

impl ModelDescription {
    /// Checks structural consistency of the description.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut body_names = HashSet::new();
        for body in &self.bodies {
            if body.name.is_empty() || body.name == GROUND {
                return Err(ModelError::Invalid(format!(
                    "invalid body name '{}'",
                    body.name
                )));
            }
            if !body_names.insert(body.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate body '{}'",
                    body.name
                )));
            }
            if body.mass < 0.0 {
                return Err(ModelError::Invalid(format!(
                    "body '{}' has negative mass",
                    body.name
                )));
            }
        }

        let mut joint_names = HashSet::new();
        let mut coordinate_names = HashSet::new();
        let mut children = HashSet::new();
        for joint in &self.joints {
            if !joint_names.insert(joint.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate joint '{}'",
                    joint.name
                )));
            }
            if joint.parent != GROUND && !body_names.contains(joint.parent.as_str()) {
                return Err(ModelError::UnknownBody(joint.parent.clone()));
            }
            if !body_names.contains(joint.child.as_str()) {
                return Err(ModelError::UnknownBody(joint.child.clone()));
            }
            if !children.insert(joint.child.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "body '{}' is the child of more than one joint",
                    joint.child
                )));
            }
            for coordinate in &joint.coordinates {
                if !coordinate_names.insert(coordinate.name.as_str()) {
                    return Err(ModelError::Invalid(format!(
                        "duplicate coordinate '{}'",
                        coordinate.name
                    )));
                }
            }
            validate_joint_kind(joint)?;
        }

        for body in &self.bodies {
            if !children.contains(body.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "body '{}' is not attached by any joint",
                    body.name
                )));
            }
        }

        let mut contact_names = HashSet::new();
        for contact in &self.contacts {
            if !contact_names.insert(contact.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "duplicate contact element '{}'",
                    contact.name
                )));
            }
            if !body_names.contains(contact.body.as_str()) {
                return Err(ModelError::UnknownBody(contact.body.clone()));
            }
            if contact.radius <= 0.0 {
                return Err(ModelError::Invalid(format!(
                    "contact element '{}' must have a positive radius",
                    contact.name
                )));
            }
        }

        Ok(())
    }

    /// Looks up a body by name.
    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.iter().find(|b| b.name == name)
    }

    /// Returns true if `name` is ground or a body of the model.
    pub fn has_frame(&self, name: &str) -> bool {
        name == GROUND || self.body(name).is_some()
    }

    /// Returns true when the joint drives a patella body or owns only patella coordinates.
    pub fn is_patella_joint(&self, joint: &Joint) -> bool {
        is_patella(&joint.child) || is_patella(&joint.name)
    }

    /// Joints contributing to inverse dynamics, in model order.
    pub fn active_joints(&self) -> Vec<&Joint> {
        self.joints
            .iter()
            .filter(|j| !self.is_patella_joint(j))
            .collect()
    }

    /// Coordinates contributing to inverse dynamics, in model order.
    pub fn active_coordinates(&self) -> Vec<&Coordinate> {
        self.active_joints()
            .into_iter()
            .flat_map(|j| j.coordinates.iter())
            .filter(|c| !is_patella(&c.name))
            .collect()
    }

    /// Bodies that are not patellae, in model order.
    pub fn active_bodies(&self) -> Vec<&Body> {
        self.bodies.iter().filter(|b| !is_patella(&b.name)).collect()
    }
}

fn validate_joint_kind(joint: &Joint) -> Result<(), ModelError> {
    match joint.kind {
        JointKind::Pin if joint.coordinates.len() != 1 => Err(ModelError::Invalid(format!(
            "pin joint '{}' needs exactly one coordinate",
            joint.name
        ))),
        JointKind::Weld if !joint.coordinates.is_empty() => Err(ModelError::Invalid(format!(
            "weld joint '{}' cannot have coordinates",
            joint.name
        ))),
        JointKind::Custom => {
            let rotations = joint
                .transform_axes
                .iter()
                .filter(|a| a.kind == AxisKind::Rotation)
                .count();
            let translations = joint.transform_axes.len() - rotations;
            if rotations > 3 || translations > 3 {
                return Err(ModelError::Invalid(format!(
                    "custom joint '{}' has more than three rotation or translation axes",
                    joint.name
                )));
            }
            for axis in &joint.transform_axes {
                if let Some(coordinate) = &axis.coordinate {
                    if !joint.coordinates.iter().any(|c| &c.name == coordinate) {
                        return Err(ModelError::Invalid(format!(
                            "custom joint '{}' axis references unknown coordinate '{}'",
                            joint.name, coordinate
                        )));
                    }
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn pin_joint(name: &str, parent: &str, child: &str, coordinate: &str) -> Joint {
        Joint {
            name: name.to_string(),
            kind: JointKind::Pin,
            parent: parent.to_string(),
            child: child.to_string(),
            location_in_parent: [0.0; 3],
            orientation_in_parent: [0.0; 3],
            location_in_child: [0.0; 3],
            orientation_in_child: [0.0; 3],
            coordinates: vec![Coordinate {
                name: coordinate.to_string(),
                default_value: 0.0,
                range: None,
            }],
            transform_axes: Vec::new(),
        }
    }

    pub fn body(name: &str) -> Body {
        Body {
            name: name.to_string(),
            mass: 1.0,
            mass_center: [0.0, -0.5, 0.0],
            inertia: [0.1, 0.1, 0.1, 0.0, 0.0, 0.0],
        }
    }

    pub fn contact(name: &str, body: &str) -> ContactElement {
        serde_yaml::from_str(&format!(
            "name: {name}\nbody: {body}\nlocation: [0.0, -0.1, 0.0]\nradius: 0.03\n"
        ))
        .unwrap()
    }

    /// Two links chained to ground by pin joints.
    pub fn two_link() -> ModelDescription {
        ModelDescription {
            name: "two_link".to_string(),
            gravity: [0.0, -9.80665, 0.0],
            bodies: vec![body("link1"), body("link2")],
            joints: vec![
                pin_joint("j1", GROUND, "link1", "q1"),
                pin_joint("j2", "link1", "link2", "q2"),
            ],
            contacts: Vec::new(),
        }
    }

    /// Leg with a patella and three contact spheres on the foot.
    pub fn leg_with_patella() -> ModelDescription {
        ModelDescription {
            name: "leg".to_string(),
            gravity: [0.0, -9.80665, 0.0],
            bodies: vec![
                body("femur_r"),
                body("tibia_r"),
                body("patella_r"),
                body("calcn_r"),
            ],
            joints: vec![
                pin_joint("hip_r", GROUND, "femur_r", "hip_flexion_r"),
                pin_joint("knee_r", "femur_r", "tibia_r", "knee_angle_r"),
                pin_joint("patellofemoral_r", "femur_r", "patella_r", "knee_angle_r_beta"),
                pin_joint("ankle_r", "tibia_r", "calcn_r", "ankle_angle_r"),
            ],
            contacts: vec![
                contact("R_heel", "calcn_r"),
                contact("toe_l", "calcn_r"),
                contact("contact1", "calcn_r"),
            ],
        }
    }
}

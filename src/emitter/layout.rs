//! Requested function layout and its resolution against a model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::{ContactElement, Joint, ModelDescription};

/// Inputs, outputs and ordering requested for the generated function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionLayout {
    /// Joint order override; must list every non-patella joint.
    pub joints_order: Option<Vec<String>>,
    /// Coordinate order override; must list every non-patella coordinate.
    pub coordinates_order: Option<Vec<String>>,
    /// Bodies receiving an extra 3-D force input.
    pub body_forces: Vec<String>,
    /// Bodies receiving an extra 3-D moment input.
    pub body_moments: Vec<String>,
    /// Bodies whose origin position is exported.
    pub export_positions: Vec<String>,
    /// Bodies whose origin velocity is exported.
    pub export_velocities: Vec<String>,
    /// Export aggregated right/left ground reaction forces.
    pub export_grfs: bool,
    /// Export aggregated right/left ground reaction moments.
    pub export_grms: bool,
    /// Export one ground reaction force per contact element.
    pub export_separate_grfs: bool,
    /// Export the power dissipated by each contact element.
    pub export_contact_powers: bool,
}

impl FunctionLayout {
    /// Creates a layout with model ordering and no extra inputs or outputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the joint order override.
    pub fn with_joints_order<I, S>(mut self, joints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.joints_order = Some(joints.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the coordinate order override.
    pub fn with_coordinates_order<I, S>(mut self, coordinates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.coordinates_order = Some(coordinates.into_iter().map(Into::into).collect());
        self
    }

    /// Enables or disables aggregated GRF export.
    pub fn with_grfs(mut self, export: bool) -> Self {
        self.export_grfs = export;
        self
    }

    /// Enables or disables aggregated GRM export.
    pub fn with_grms(mut self, export: bool) -> Self {
        self.export_grms = export;
        self
    }

    /// Enables or disables per-element GRF export.
    pub fn with_separate_grfs(mut self, export: bool) -> Self {
        self.export_separate_grfs = export;
        self
    }

    /// Enables or disables contact power export.
    pub fn with_contact_powers(mut self, export: bool) -> Self {
        self.export_contact_powers = export;
        self
    }

    /// Adds a body receiving a 3-D force input.
    pub fn with_body_force(mut self, body: impl Into<String>) -> Self {
        self.body_forces.push(body.into());
        self
    }

    /// Adds a body receiving a 3-D moment input.
    pub fn with_body_moment(mut self, body: impl Into<String>) -> Self {
        self.body_moments.push(body.into());
        self
    }

    /// Adds a body whose position is exported.
    pub fn with_position(mut self, body: impl Into<String>) -> Self {
        self.export_positions.push(body.into());
        self
    }

    /// Adds a body whose velocity is exported.
    pub fn with_velocity(mut self, body: impl Into<String>) -> Self {
        self.export_velocities.push(body.into());
        self
    }

    /// Returns true when any contact-derived output is requested.
    pub fn exports_contacts(&self) -> bool {
        self.export_grfs || self.export_grms || self.export_separate_grfs || self.export_contact_powers
    }
}

/// A layout resolved against a specific model.
#[derive(Debug, Clone)]
pub struct ResolvedLayout<'m> {
    pub joints: Vec<&'m Joint>,
    /// Coordinate names in function order.
    pub coordinates: Vec<String>,
    pub contacts: Vec<&'m ContactElement>,
}

/// Applies ordering overrides and checks every referenced body exists.
pub fn resolve<'m>(
    model: &'m ModelDescription,
    layout: &FunctionLayout,
) -> Result<ResolvedLayout<'m>, ModelError> {
    let active = model.active_joints();

    let joints = match &layout.joints_order {
        Some(order) => {
            let names: Vec<&str> = active.iter().map(|j| j.name.as_str()).collect();
            check_permutation("Joint", order, &names)?;
            order
                .iter()
                .filter_map(|name| active.iter().find(|j| &j.name == name).copied())
                .collect()
        }
        None => active,
    };

    let joint_ordered: Vec<String> = {
        let model_coordinates: HashSet<&str> = model
            .active_coordinates()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        joints
            .iter()
            .flat_map(|j| j.coordinates.iter())
            .filter(|c| model_coordinates.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect()
    };

    let coordinates = match &layout.coordinates_order {
        Some(order) => {
            let names: Vec<&str> = joint_ordered.iter().map(String::as_str).collect();
            check_permutation("Coordinate", order, &names)?;
            order.clone()
        }
        None => joint_ordered,
    };

    // Applied loads need a mobilized body; kinematic exports may also name ground.
    for body in layout.body_forces.iter().chain(&layout.body_moments) {
        if model.body(body).is_none() {
            return Err(ModelError::UnknownBody(body.clone()));
        }
    }
    for body in layout.export_positions.iter().chain(&layout.export_velocities) {
        if !model.has_frame(body) {
            return Err(ModelError::UnknownBody(body.clone()));
        }
    }

    check_unique("body_forces", &layout.body_forces)?;
    check_unique("body_moments", &layout.body_moments)?;
    check_unique("export_positions", &layout.export_positions)?;
    check_unique("export_velocities", &layout.export_velocities)?;

    if layout.exports_contacts() && model.contacts.is_empty() {
        return Err(ModelError::Invalid(
            "contact outputs requested but the model has no contact elements".to_string(),
        ));
    }

    Ok(ResolvedLayout {
        joints,
        coordinates,
        contacts: model.contacts.iter().collect(),
    })
}

/// Each body may appear once per list; every entry claims its own slots.
fn check_unique(what: &str, bodies: &[String]) -> Result<(), ModelError> {
    let mut seen = HashSet::new();
    match bodies.iter().find(|b| !seen.insert(b.as_str())) {
        Some(body) => Err(ModelError::Invalid(format!("'{body}' listed twice in {what}"))),
        None => Ok(()),
    }
}

fn check_permutation(what: &'static str, order: &[String], expected: &[&str]) -> Result<(), ModelError> {
    let given: HashSet<&str> = order.iter().map(String::as_str).collect();
    if given.len() != order.len() {
        return Err(ModelError::OrderMismatch {
            what,
            message: "duplicate entries".to_string(),
        });
    }

    let wanted: HashSet<&str> = expected.iter().copied().collect();
    let mut missing: Vec<&str> = wanted.difference(&given).copied().collect();
    let mut unknown: Vec<&str> = given.difference(&wanted).copied().collect();
    if missing.is_empty() && unknown.is_empty() {
        return Ok(());
    }

    missing.sort_unstable();
    unknown.sort_unstable();
    Err(ModelError::OrderMismatch {
        what,
        message: format!("missing [{}], unknown [{}]", missing.join(", "), unknown.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{leg_with_patella, two_link};
    use crate::model::GROUND;

    #[test]
    fn test_default_order_follows_model() {
        let model = two_link();
        let resolved = resolve(&model, &FunctionLayout::new()).unwrap();
        assert_eq!(resolved.coordinates, vec!["q1", "q2"]);
        assert_eq!(resolved.joints.len(), 2);
    }

    #[test]
    fn test_joint_order_reorders_coordinates() {
        let model = two_link();
        let layout = FunctionLayout::new().with_joints_order(["j2", "j1"]);
        let resolved = resolve(&model, &layout).unwrap();
        assert_eq!(resolved.coordinates, vec!["q2", "q1"]);
    }

    #[test]
    fn test_coordinate_order_override() {
        let model = leg_with_patella();
        let layout = FunctionLayout::new().with_coordinates_order([
            "ankle_angle_r",
            "hip_flexion_r",
            "knee_angle_r",
        ]);
        let resolved = resolve(&model, &layout).unwrap();
        assert_eq!(resolved.coordinates[0], "ankle_angle_r");
    }

    #[test]
    fn test_order_must_be_complete() {
        let model = two_link();
        let layout = FunctionLayout::new().with_coordinates_order(["q1"]);
        let err = resolve(&model, &layout).unwrap_err();
        assert!(err.to_string().contains("missing [q2]"));
    }

    #[test]
    fn test_patella_coordinate_not_orderable() {
        let model = leg_with_patella();
        let layout = FunctionLayout::new().with_coordinates_order([
            "hip_flexion_r",
            "knee_angle_r",
            "ankle_angle_r",
            "knee_angle_r_beta",
        ]);
        assert!(matches!(
            resolve(&model, &layout),
            Err(ModelError::OrderMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_body_request() {
        let model = two_link();
        let layout = FunctionLayout::new().with_body_force("torso");
        assert!(matches!(
            resolve(&model, &layout),
            Err(ModelError::UnknownBody(name)) if name == "torso"
        ));
    }

    #[test]
    fn test_contact_outputs_need_contacts() {
        let model = two_link();
        let layout = FunctionLayout::new().with_grfs(true);
        assert!(resolve(&model, &layout).is_err());
    }

    #[test]
    fn test_duplicate_body_requests_rejected() {
        let model = two_link();
        let layout = FunctionLayout::new()
            .with_body_force("link2")
            .with_body_force("link2");
        let err = resolve(&model, &layout).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
        assert!(err.to_string().contains("body_forces"));

        let layout = FunctionLayout::new().with_velocity("link1").with_velocity("link1");
        assert!(matches!(resolve(&model, &layout), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn test_same_body_in_different_lists() {
        let model = two_link();
        let layout = FunctionLayout::new()
            .with_body_force("link2")
            .with_body_moment("link2")
            .with_position("link2");
        assert!(resolve(&model, &layout).is_ok());
    }

    #[test]
    fn test_loads_on_ground_rejected() {
        let model = two_link();
        let layout = FunctionLayout::new().with_body_force(GROUND);
        assert!(matches!(
            resolve(&model, &layout),
            Err(ModelError::UnknownBody(name)) if name == GROUND
        ));
        let layout = FunctionLayout::new().with_body_moment(GROUND);
        assert!(matches!(resolve(&model, &layout), Err(ModelError::UnknownBody(_))));

        let layout = FunctionLayout::new().with_position(GROUND);
        assert!(resolve(&model, &layout).is_ok());
    }
}

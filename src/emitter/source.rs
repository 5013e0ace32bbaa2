//! Rendering of the AD source file.

use std::collections::BTreeMap;

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::EmitError;
use crate::model::{AxisKind, Joint, JointKind, ModelDescription, Side, GROUND};

use super::index_map::{zero_based, IndexMap};
use super::layout::ResolvedLayout;
use super::templates::SOURCE_TEMPLATE;

#[derive(Debug, Serialize)]
struct BodyView {
    ident: String,
    name: String,
    mass: String,
    mass_center: String,
    inertia: String,
}

#[derive(Debug, Serialize)]
struct AxisView {
    index: usize,
    coordinate: Option<String>,
    axis: String,
    constant: String,
}

#[derive(Debug, Serialize)]
struct JointView {
    ident: String,
    name: String,
    class_name: &'static str,
    is_custom: bool,
    parent_frame: String,
    child_ident: String,
    location_in_parent: String,
    orientation_in_parent: String,
    location_in_child: String,
    orientation_in_child: String,
    pin_coordinate: Option<String>,
    axes: Vec<AxisView>,
}

#[derive(Debug, Serialize)]
struct ContactView {
    ident: String,
    name: String,
    body_ident: String,
    location: String,
    radius: String,
    stiffness: String,
    dissipation: String,
    static_friction: String,
    dynamic_friction: String,
    viscous_friction: String,
    transition_velocity: String,
    constant_contact_force: String,
    hertz_smoothing: String,
    hunt_crossley_smoothing: String,
}

#[derive(Debug, Serialize)]
struct CoordinateView {
    name: String,
    position_index: usize,
    velocity_index: usize,
    residual_index: usize,
}

#[derive(Debug, Serialize)]
struct InputView {
    body_ident: String,
    index: usize,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    index: usize,
    ident: String,
    location: String,
    body_frame: String,
}

#[derive(Debug, Serialize)]
struct SideStart {
    right: usize,
    left: usize,
}

/// Formats a float as a C++ literal.
fn lit(value: f64) -> String {
    format!("{:?}", value)
}

fn list(values: &[f64]) -> String {
    values.iter().map(|v| lit(*v)).collect::<Vec<_>>().join(", ")
}

/// Identifier naming scheme for model components in the generated source.
struct Idents<'m> {
    model: &'m ModelDescription,
}

impl<'m> Idents<'m> {
    fn body(&self, name: &str) -> String {
        match self.model.bodies.iter().position(|b| b.name == name) {
            Some(i) => format!("body_{i}"),
            None => "ground".to_string(),
        }
    }

    fn frame(&self, name: &str) -> String {
        if name == GROUND {
            "model->getGround()".to_string()
        } else {
            format!("*{}", self.body(name))
        }
    }

    /// Frame reference usable with `.` member access.
    fn frame_ref(&self, name: &str) -> String {
        if name == GROUND {
            "model->getGround()".to_string()
        } else {
            format!("(*{})", self.body(name))
        }
    }

    fn contact(&self, name: &str) -> String {
        let i = self
            .model
            .contacts
            .iter()
            .position(|c| c.name == name)
            .unwrap_or_default();
        format!("contact_{i}")
    }
}

fn joint_view(index: usize, joint: &Joint, idents: &Idents<'_>) -> JointView {
    let mut rotations = 0;
    let mut translations = 3;
    let axes = joint
        .transform_axes
        .iter()
        .map(|axis| {
            let slot = match axis.kind {
                AxisKind::Rotation => &mut rotations,
                AxisKind::Translation => &mut translations,
            };
            let index = *slot;
            *slot += 1;
            AxisView {
                index,
                coordinate: axis.coordinate.clone(),
                axis: list(&axis.axis),
                constant: lit(axis.constant),
            }
        })
        .collect();

    JointView {
        ident: format!("joint_{index}"),
        name: joint.name.clone(),
        class_name: joint.kind.class_name(),
        is_custom: joint.kind == JointKind::Custom,
        parent_frame: idents.frame(&joint.parent),
        child_ident: idents.body(&joint.child),
        location_in_parent: list(&joint.location_in_parent),
        orientation_in_parent: list(&joint.orientation_in_parent),
        location_in_child: list(&joint.location_in_child),
        orientation_in_child: list(&joint.orientation_in_child),
        pin_coordinate: match joint.kind {
            JointKind::Pin => joint.coordinates.first().map(|c| c.name.clone()),
            _ => None,
        },
        axes,
    }
}

/// Renders the AD source for `model` with the given resolved layout and map.
pub fn render_source(
    model: &ModelDescription,
    resolved: &ResolvedLayout<'_>,
    map: &IndexMap,
    job: &str,
    graph_file: &str,
) -> Result<String, EmitError> {
    let idents = Idents { model };

    let bodies: Vec<BodyView> = model
        .bodies
        .iter()
        .map(|b| BodyView {
            ident: idents.body(&b.name),
            name: b.name.clone(),
            mass: lit(b.mass),
            mass_center: list(&b.mass_center),
            inertia: list(&b.inertia),
        })
        .collect();

    // Every joint is built, patella joints included; only their coordinates
    // are left out of the function inputs.
    let joints: Vec<JointView> = model
        .joints
        .iter()
        .enumerate()
        .map(|(i, j)| joint_view(i, j, &idents))
        .collect();

    let contacts: Vec<ContactView> = resolved
        .contacts
        .iter()
        .map(|c| ContactView {
            ident: idents.contact(&c.name),
            name: c.name.clone(),
            body_ident: idents.body(&c.body),
            location: list(&c.location),
            radius: lit(c.radius),
            stiffness: lit(c.stiffness),
            dissipation: lit(c.dissipation),
            static_friction: lit(c.static_friction),
            dynamic_friction: lit(c.dynamic_friction),
            viscous_friction: lit(c.viscous_friction),
            transition_velocity: lit(c.transition_velocity),
            constant_contact_force: lit(c.constant_contact_force),
            hertz_smoothing: lit(c.hertz_smoothing),
            hunt_crossley_smoothing: lit(c.hunt_crossley_smoothing),
        })
        .collect();

    let coordinates: Vec<CoordinateView> = map
        .coordinate_order
        .iter()
        .filter_map(|name| {
            let offsets = map.coordinates.get(name)?;
            let residual = map.residuals.get(name)?;
            Some(CoordinateView {
                name: name.clone(),
                position_index: zero_based(offsets.position),
                velocity_index: zero_based(offsets.velocity),
                residual_index: zero_based(*residual),
            })
        })
        .collect();

    let inputs = |entries: &BTreeMap<String, [usize; 3]>| {
        let mut views: Vec<InputView> = entries
            .iter()
            .map(|(body, offsets)| InputView {
                body_ident: idents.body(body),
                index: zero_based(offsets[0]),
            })
            .collect();
        views.sort_by_key(|v| v.index);
        views
    };

    let contact_rows = |entries: Vec<(String, usize)>| {
        entries
            .into_iter()
            .map(|(name, offset)| {
                let location = model
                    .contacts
                    .iter()
                    .find(|c| c.name == name)
                    .map(|c| list(&c.location))
                    .unwrap_or_default();
                OutputRow {
                    index: zero_based(offset),
                    ident: idents.contact(&name),
                    location,
                    body_frame: String::new(),
                }
            })
            .collect::<Vec<_>>()
    };

    let body_rows = |entries: &BTreeMap<String, [usize; 3]>| {
        let mut rows: Vec<OutputRow> = entries
            .iter()
            .map(|(name, offsets)| OutputRow {
                index: zero_based(offsets[0]),
                ident: idents.body(name),
                location: String::new(),
                body_frame: idents.frame_ref(name),
            })
            .collect();
        rows.sort_by_key(|r| r.index);
        rows
    };

    let side_idents = |side: Side| -> Vec<String> {
        map.contact_sides
            .get(&side)
            .map(|names| names.iter().map(|n| idents.contact(n)).collect())
            .unwrap_or_default()
    };

    let mut separate: Vec<(String, usize)> = map
        .separate_grfs
        .iter()
        .map(|(name, offsets)| (name.clone(), offsets[0]))
        .collect();
    separate.sort_by_key(|(_, offset)| *offset);
    let mut powers: Vec<(String, usize)> = map
        .contact_powers
        .iter()
        .map(|(name, offset)| (name.clone(), *offset))
        .collect();
    powers.sort_by_key(|(_, offset)| *offset);

    let mut context = Context::new();
    context.insert("model_name", &model.name);
    context.insert("job", job);
    context.insert("graph_file", graph_file);
    context.insert("gravity", &list(&model.gravity));
    context.insert("n_coordinates", &map.n_coordinates);
    context.insert("n_inputs", &map.n_inputs);
    context.insert("n_outputs", &map.n_outputs);
    context.insert("bodies", &bodies);
    context.insert("joints", &joints);
    context.insert(
        "contacts",
        &if map_uses_contacts(map) { contacts } else { Vec::new() },
    );
    context.insert("coordinates", &coordinates);
    context.insert("body_forces", &inputs(&map.body_forces));
    context.insert("body_moments", &inputs(&map.body_moments));
    context.insert(
        "grfs",
        &map.grfs.map(|g| SideStart {
            right: zero_based(g.right[0]),
            left: zero_based(g.left[0]),
        }),
    );
    context.insert(
        "grms",
        &map.grms.map(|g| SideStart {
            right: zero_based(g.right[0]),
            left: zero_based(g.left[0]),
        }),
    );
    context.insert("right_contacts", &side_idents(Side::Right));
    context.insert("left_contacts", &side_idents(Side::Left));
    context.insert("separate_grfs", &contact_rows(separate));
    context.insert("contact_powers", &contact_rows(powers));
    context.insert("positions", &body_rows(&map.positions));
    context.insert("velocities", &body_rows(&map.velocities));

    Ok(Tera::one_off(SOURCE_TEMPLATE, &context, false)?)
}

fn map_uses_contacts(map: &IndexMap) -> bool {
    map.grfs.is_some()
        || map.grms.is_some()
        || !map.separate_grfs.is_empty()
        || !map.contact_powers.is_empty()
}

//! Serializable description of a musculoskeletal model.
//!
//! The description mirrors the parts of a model file that the emitted
//! source needs: rigid bodies, the joints connecting them (with their
//! coordinates), and smooth sphere contact elements against the ground.

use serde::{Deserialize, Serialize};

/// Name of the implicit ground frame every joint tree hangs from.
pub const GROUND: &str = "ground";

fn default_gravity() -> [f64; 3] {
    [0.0, -9.80665, 0.0]
}

/// A complete model description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Model name, used only in generated comments and logs.
    pub name: String,
    /// Gravity vector expressed in ground.
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    /// Rigid bodies, excluding ground.
    pub bodies: Vec<Body>,
    /// Joints in model order.
    pub joints: Vec<Joint>,
    /// Contact spheres attached to bodies.
    #[serde(default)]
    pub contacts: Vec<ContactElement>,
}

/// A rigid body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    pub mass: f64,
    #[serde(default)]
    pub mass_center: [f64; 3],
    /// Inertia about the mass center: `[Ixx, Iyy, Izz, Ixy, Ixz, Iyz]`.
    #[serde(default)]
    pub inertia: [f64; 6],
}

/// Supported joint types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    /// Spatial transform built from up to three rotation and three translation axes.
    Custom,
    /// Single rotational degree of freedom about the joint frame z axis.
    Pin,
    /// Rigid attachment with no coordinates.
    Weld,
}

impl JointKind {
    /// Class name used in the emitted source.
    pub fn class_name(&self) -> &'static str {
        match self {
            JointKind::Custom => "CustomJoint",
            JointKind::Pin => "PinJoint",
            JointKind::Weld => "WeldJoint",
        }
    }
}

impl std::fmt::Display for JointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.class_name())
    }
}

/// A joint between a parent frame and a child body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    pub kind: JointKind,
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub location_in_parent: [f64; 3],
    #[serde(default)]
    pub orientation_in_parent: [f64; 3],
    #[serde(default)]
    pub location_in_child: [f64; 3],
    #[serde(default)]
    pub orientation_in_child: [f64; 3],
    #[serde(default)]
    pub coordinates: Vec<Coordinate>,
    /// Spatial transform axes; only meaningful for custom joints.
    #[serde(default)]
    pub transform_axes: Vec<TransformAxis>,
}

/// A generalized coordinate owned by a joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub name: String,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

/// Rotation or translation component of a custom joint transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisKind {
    Rotation,
    Translation,
}

/// One axis of a custom joint spatial transform.
///
/// An axis either follows a coordinate linearly or stays at a constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformAxis {
    pub kind: AxisKind,
    pub axis: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate: Option<String>,
    #[serde(default)]
    pub constant: f64,
}

/// A smooth sphere contact element acting against the ground half-space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactElement {
    pub name: String,
    /// Body the sphere is attached to.
    pub body: String,
    /// Sphere center expressed in the body frame.
    pub location: [f64; 3],
    pub radius: f64,
    #[serde(default = "defaults::stiffness")]
    pub stiffness: f64,
    #[serde(default = "defaults::dissipation")]
    pub dissipation: f64,
    #[serde(default = "defaults::friction")]
    pub static_friction: f64,
    #[serde(default = "defaults::friction")]
    pub dynamic_friction: f64,
    #[serde(default = "defaults::viscous_friction")]
    pub viscous_friction: f64,
    #[serde(default = "defaults::transition_velocity")]
    pub transition_velocity: f64,
    #[serde(default = "defaults::constant_contact_force")]
    pub constant_contact_force: f64,
    #[serde(default = "defaults::hertz_smoothing")]
    pub hertz_smoothing: f64,
    #[serde(default = "defaults::hunt_crossley_smoothing")]
    pub hunt_crossley_smoothing: f64,
}

mod defaults {
    pub fn stiffness() -> f64 {
        1.0e6
    }
    pub fn dissipation() -> f64 {
        2.0
    }
    pub fn friction() -> f64 {
        0.8
    }
    pub fn viscous_friction() -> f64 {
        0.5
    }
    pub fn transition_velocity() -> f64 {
        0.2
    }
    pub fn constant_contact_force() -> f64 {
        1.0e-5
    }
    pub fn hertz_smoothing() -> f64 {
        300.0
    }
    pub fn hunt_crossley_smoothing() -> f64 {
        50.0
    }
}

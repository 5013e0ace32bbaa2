//! Embedded template for the AD source file.

/// C++ source consumed by the AD-enabled model-building tool.
///
/// Rendered with tera; all numbers arrive pre-formatted as literals.
pub const SOURCE_TEMPLATE: &str = r#"// Generated by ad-forge from model '{{ model_name }}' for function '{{ job }}'.
// Do not edit: regenerate instead.
//
// Inputs ({{ n_inputs }}): positions/velocities interleaved, accelerations{% if body_forces %}, body forces{% endif %}{% if body_moments %}, body moments{% endif %}.
// Outputs ({{ n_outputs }}): residuals{% if grfs %}, GRFs{% endif %}{% if grms %}, GRMs{% endif %}{% if separate_grfs %}, per-sphere GRFs{% endif %}{% if contact_powers %}, contact powers{% endif %}{% if positions %}, positions{% endif %}{% if velocities %}, velocities{% endif %}.

#include <OpenSim/Simulation/Model/Model.h>
#include <OpenSim/Simulation/SimbodyEngine/PinJoint.h>
#include <OpenSim/Simulation/SimbodyEngine/WeldJoint.h>
#include <OpenSim/Simulation/SimbodyEngine/CustomJoint.h>
#include <OpenSim/Simulation/SimbodyEngine/SpatialTransform.h>
#include <OpenSim/Simulation/Model/SmoothSphereHalfSpaceForce.h>
#include <OpenSim/Common/LinearFunction.h>
#include <OpenSim/Common/Constant.h>
#include "SimTKcommon/internal/recorder.h"

#include <iostream>
#include <string>
#include <vector>

using namespace SimTK;
using namespace OpenSim;

constexpr int n_in = 1;
constexpr int n_out = 1;
constexpr int ndof = {{ n_coordinates }};
constexpr int NX = ndof * 2;
constexpr int NU = ndof;
constexpr int NIN = {{ n_inputs }};
constexpr int NR = {{ n_outputs }};

template<typename T>
T value(const Recorder& e) { return e; }

template<>
double value(const Recorder& e) { return e.getValue(); }

// First mobility index of a coordinate in the multibody system.
static int mobilityIndex(const OpenSim::Model& model, const SimTK::State& state, const std::string& name) {
    const OpenSim::Coordinate& coordinate = model.getCoordinateSet().get(name);
    const SimTK::MobilizedBody& mobod = model.getMatterSubsystem().getMobilizedBody(coordinate.getBodyIndex());
    return int(mobod.getFirstUIndex(state)) + coordinate.getMobilizerQIndex();
}

template<typename T>
int F_generic(const T** arg, T** res) {
    OpenSim::Model* model = new OpenSim::Model();
    model->setName("{{ model_name }}");
    model->setGravity(Vec3({{ gravity }}));

    // Bodies.
{%- for body in bodies %}
    OpenSim::Body* {{ body.ident }} = new OpenSim::Body("{{ body.name }}", {{ body.mass }}, Vec3({{ body.mass_center }}), Inertia({{ body.inertia }}));
    model->addBody({{ body.ident }});
{%- endfor %}

    // Joints.
{%- for joint in joints %}
{%- if joint.is_custom %}
    SpatialTransform st_{{ joint.ident }};
{%- for axis in joint.axes %}
{%- if axis.coordinate %}
    st_{{ joint.ident }}[{{ axis.index }}].setCoordinateNames(OpenSim::Array<std::string>("{{ axis.coordinate }}", 1, 1));
    st_{{ joint.ident }}[{{ axis.index }}].setFunction(new LinearFunction());
{%- else %}
    st_{{ joint.ident }}[{{ axis.index }}].setFunction(new Constant({{ axis.constant }}));
{%- endif %}
    st_{{ joint.ident }}[{{ axis.index }}].setAxis(Vec3({{ axis.axis }}));
{%- endfor %}
    OpenSim::CustomJoint* {{ joint.ident }} = new OpenSim::CustomJoint("{{ joint.name }}", {{ joint.parent_frame }}, Vec3({{ joint.location_in_parent }}), Vec3({{ joint.orientation_in_parent }}), *{{ joint.child_ident }}, Vec3({{ joint.location_in_child }}), Vec3({{ joint.orientation_in_child }}), st_{{ joint.ident }});
{%- else %}
    OpenSim::{{ joint.class_name }}* {{ joint.ident }} = new OpenSim::{{ joint.class_name }}("{{ joint.name }}", {{ joint.parent_frame }}, Vec3({{ joint.location_in_parent }}), Vec3({{ joint.orientation_in_parent }}), *{{ joint.child_ident }}, Vec3({{ joint.location_in_child }}), Vec3({{ joint.orientation_in_child }}));
{%- if joint.pin_coordinate %}
    {{ joint.ident }}->updCoordinate().setName("{{ joint.pin_coordinate }}");
{%- endif %}
{%- endif %}
    model->addJoint({{ joint.ident }});
{%- endfor %}
{% if contacts %}
    // Contact elements against the ground half-space.
    OpenSim::ContactHalfSpace* floor = new ContactHalfSpace(Vec3(0), Vec3(0, 0, -0.5 * SimTK::Pi), model->getGround(), "floor");
    model->addContactGeometry(floor);
{%- for contact in contacts %}
    OpenSim::ContactSphere* geom_{{ contact.ident }} = new ContactSphere({{ contact.radius }}, Vec3({{ contact.location }}), *{{ contact.body_ident }}, "{{ contact.name }}_geometry");
    model->addContactGeometry(geom_{{ contact.ident }});
    OpenSim::SmoothSphereHalfSpaceForce* {{ contact.ident }} = new SmoothSphereHalfSpaceForce("{{ contact.name }}", *geom_{{ contact.ident }}, *floor);
    {{ contact.ident }}->set_stiffness({{ contact.stiffness }});
    {{ contact.ident }}->set_dissipation({{ contact.dissipation }});
    {{ contact.ident }}->set_static_friction({{ contact.static_friction }});
    {{ contact.ident }}->set_dynamic_friction({{ contact.dynamic_friction }});
    {{ contact.ident }}->set_viscous_friction({{ contact.viscous_friction }});
    {{ contact.ident }}->set_transition_velocity({{ contact.transition_velocity }});
    {{ contact.ident }}->set_constant_contact_force({{ contact.constant_contact_force }});
    {{ contact.ident }}->set_hertz_smoothing({{ contact.hertz_smoothing }});
    {{ contact.ident }}->set_hunt_crossley_smoothing({{ contact.hunt_crossley_smoothing }});
    {{ contact.ident }}->connectSocket_sphere(*geom_{{ contact.ident }});
    {{ contact.ident }}->connectSocket_half_space(*floor);
    model->addComponent({{ contact.ident }});
{%- endfor %}
{% endif %}
    SimTK::State* state = new State(model->initSystem());

    // Read inputs. Patella coordinates are not inputs and stay at their defaults.
    std::vector<T> x(arg[0], arg[0] + NX);
    std::vector<T> u(arg[0] + NX, arg[0] + NX + NU);
{%- for coordinate in coordinates %}
    model->getCoordinateSet().get("{{ coordinate.name }}").setValue(*state, value<T>(x[{{ coordinate.position_index }}]), false);
    model->getCoordinateSet().get("{{ coordinate.name }}").setSpeedValue(*state, value<T>(x[{{ coordinate.velocity_index }}]));
{%- endfor %}
    model->assemble(*state);
    model->getMultibodySystem().realize(*state, Stage::Dynamics);

    SimTK::Vector knownUdot(state->getNU());
    knownUdot.setToZero();
{%- for coordinate in coordinates %}
    knownUdot[mobilityIndex(*model, *state, "{{ coordinate.name }}")] = u[{{ loop.index0 }}];
{%- endfor %}

    Vector_<SpatialVec> appliedBodyForces = model->getMultibodySystem().getRigidBodyForces(*state, Stage::Dynamics);
    SimTK::Vector appliedMobilityForces = model->getMultibodySystem().getMobilityForces(*state, Stage::Dynamics);
{%- for force in body_forces %}
    appliedBodyForces[{{ force.body_ident }}->getMobilizedBodyIndex()][1] += Vec3(arg[0][{{ force.index }}], arg[0][{{ force.index + 1 }}], arg[0][{{ force.index + 2 }}]);
{%- endfor %}
{%- for moment in body_moments %}
    appliedBodyForces[{{ moment.body_ident }}->getMobilizedBodyIndex()][0] += Vec3(arg[0][{{ moment.index }}], arg[0][{{ moment.index + 1 }}], arg[0][{{ moment.index + 2 }}]);
{%- endfor %}

    SimTK::Vector residualMobilityForces;
    model->getMatterSubsystem().calcResidualForceIgnoringConstraints(*state, appliedMobilityForces, appliedBodyForces, knownUdot, residualMobilityForces);

    // Residuals.
{%- for coordinate in coordinates %}
    res[0][{{ coordinate.residual_index }}] = value<T>(residualMobilityForces[mobilityIndex(*model, *state, "{{ coordinate.name }}")]);
{%- endfor %}
{% if contacts %}
    // Contact forces on the half-space, expressed in ground.
{%- for contact in contacts %}
    Array<osim_double_adouble> values_{{ contact.ident }} = {{ contact.ident }}->getRecordValues(*state);
    Vec3 force_{{ contact.ident }}(values_{{ contact.ident }}[6], values_{{ contact.ident }}[7], values_{{ contact.ident }}[8]);
    Vec3 center_{{ contact.ident }} = geom_{{ contact.ident }}->getFrame().findStationLocationInGround(*state, Vec3({{ contact.location }}));
    Vec3 point_{{ contact.ident }} = center_{{ contact.ident }} - Vec3(0, {{ contact.radius }}, 0);
{%- endfor %}
{% endif %}
{%- if grfs %}
    Vec3 GRF_r(0), GRF_l(0);
{%- for ident in right_contacts %}
    GRF_r += force_{{ ident }};
{%- endfor %}
{%- for ident in left_contacts %}
    GRF_l += force_{{ ident }};
{%- endfor %}
    for (int i = 0; i < 3; ++i) res[0][{{ grfs.right }} + i] = value<T>(GRF_r[i]);
    for (int i = 0; i < 3; ++i) res[0][{{ grfs.left }} + i] = value<T>(GRF_l[i]);
{%- endif %}
{%- if grms %}
    Vec3 GRM_r(0), GRM_l(0);
{%- for ident in right_contacts %}
    GRM_r += cross(point_{{ ident }}, force_{{ ident }});
{%- endfor %}
{%- for ident in left_contacts %}
    GRM_l += cross(point_{{ ident }}, force_{{ ident }});
{%- endfor %}
    for (int i = 0; i < 3; ++i) res[0][{{ grms.right }} + i] = value<T>(GRM_r[i]);
    for (int i = 0; i < 3; ++i) res[0][{{ grms.left }} + i] = value<T>(GRM_l[i]);
{%- endif %}
{%- for row in separate_grfs %}
    for (int i = 0; i < 3; ++i) res[0][{{ row.index }} + i] = value<T>(force_{{ row.ident }}[i]);
{%- endfor %}
{%- for row in contact_powers %}
    {
        Vec3 velocity = geom_{{ row.ident }}->getFrame().findStationVelocityInGround(*state, Vec3({{ row.location }}));
        res[0][{{ row.index }}] = value<T>(~force_{{ row.ident }} * velocity);
    }
{%- endfor %}
{%- for row in positions %}
    {
        Vec3 position = {{ row.body_frame }}.getPositionInGround(*state);
        for (int i = 0; i < 3; ++i) res[0][{{ row.index }} + i] = value<T>(position[i]);
    }
{%- endfor %}
{%- for row in velocities %}
    {
        Vec3 velocity = {{ row.body_frame }}.getVelocityInGround(*state)[1];
        for (int i = 0; i < 3; ++i) res[0][{{ row.index }} + i] = value<T>(velocity[i]);
    }
{%- endfor %}

    return 0;
}

int main() {
    Recorder x[NIN];
    Recorder tau[NR];
    for (int i = 0; i < NIN; ++i) x[i] <<= 0;

    const Recorder* Recorder_arg[n_in] = { x };
    Recorder* Recorder_res[n_out] = { tau };

    F_generic<Recorder>(Recorder_arg, Recorder_res);

    double res[NR];
    for (int i = 0; i < NR; ++i) {
        Recorder_res[0][i] >>= res[i];
    }

    Recorder::stop_recording("{{ graph_file }}");
    return 0;
}
"#;

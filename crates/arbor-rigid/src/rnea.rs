//! Recursive Newton-Euler Algorithm (RNEA) for inverse dynamics.
//!
//! Given (q, v, q̈), compute the generalized forces τ that produce q̈.

use crate::kinematics::forward_kinematics;
use crate::{external_force, gravity_acceleration};
use arbor_math::{DVec, SpatialVec, Vec6};
use arbor_model::{Model, Result, State, check_dim};

/// Run RNEA: generalized forces for accelerations `qdd`.
pub fn rnea(model: &Model, state: &State, qdd: &DVec) -> Result<DVec> {
    rnea_with_external_forces(model, state, qdd, None)
}

/// Run RNEA with optional external spatial forces per link (link coordinates).
///
/// The result includes the joint damping term, so it inverts
/// [`aba_with_external_forces`](crate::aba_with_external_forces) exactly.
pub fn rnea_with_external_forces(
    model: &Model,
    state: &State,
    qdd: &DVec,
    external_forces: Option<&[SpatialVec]>,
) -> Result<DVec> {
    check_dim("qdd", model.nv, qdd.len())?;
    if let Some(ext) = external_forces {
        check_dim("external_forces", model.nlinks(), ext.len())?;
    }
    let kin = forward_kinematics(model, state)?;
    let g0 = gravity_acceleration(model);
    let qdd = qdd.as_slice();

    // ── Outward pass: accelerations and link forces ──
    let mut acc = vec![SpatialVec::zero(); model.nlinks()];
    let mut forces = Vec::with_capacity(model.nlinks());
    for i in model.topological_order() {
        let joint = &model.joints[i];
        let off = model.v_offsets[i];
        let a_joint = joint.joint_velocity(&qdd[off..off + joint.ndof()]);
        let a_parent = match model.parent(i) {
            Some(p) => kin.x_tree[i].apply_motion(&acc[p]),
            None => SpatialVec::zero(),
        };
        acc[i] = a_parent + kin.bias_accelerations[i] + a_joint;

        let inertia = model.links[i].inertia.to_matrix();
        let vel = &kin.velocities[i];
        let gravity = inertia.mul_vec(&kin.x_world[i].apply_motion(&g0));
        forces.push(
            inertia.mul_vec(&acc[i]) + vel.cross_force(&inertia.mul_vec(vel))
                - gravity
                - external_force(external_forces, i),
        );
    }

    // ── Inward pass: project onto joint axes, accumulate into parents ──
    let mut tau = DVec::zeros(model.nv);
    for i in model.reverse_topological_order() {
        let joint = &model.joints[i];
        let off = model.v_offsets[i];
        let s = model.motion_subspace(i);
        for k in 0..joint.ndof() {
            let axis = SpatialVec {
                data: Vec6::from_fn(|r, _| s[(r, k)]),
            };
            tau[off + k] = axis.dot(&forces[i]) + joint.damping * state.v[off + k];
        }
        if let Some(p) = model.parent(i) {
            let f = kin.x_tree[i].inv_apply_force(&forces[i]);
            forces[p] += f;
        }
    }

    Ok(tau)
}

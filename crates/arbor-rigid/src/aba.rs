//! Articulated Body Algorithm (ABA) -- O(n) forward dynamics.
//!
//! Given (q, v, τ), compute q̈ in three passes over the tree:
//! 1. Outward: velocities, velocity-product and gravity bias forces
//! 2. Inward: articulated inertias, projected through each motion subspace
//! 3. Outward: accelerations
//!
//! A joint whose reduced inertia `D = Sᵀ Iᴬ S` is singular is locked for the
//! call (q̈ = 0 for its DOFs) and reported in [`AbaOutput::degenerate_joints`].

use crate::kinematics::forward_kinematics;
use crate::{external_force, gravity_acceleration, to_dmat, to_dvec, to_spatial, to_spatial_mat};
use arbor_math::{DMat, DVec, SpatialMat, SpatialVec};
use arbor_model::{Model, Result, State, check_dim};
use tracing::warn;

/// Relative threshold below which a reduced inertia block counts as singular.
const DEGENERACY_TOL: f64 = 1e-12;

/// Result of a forward-dynamics call.
#[derive(Debug, Clone, PartialEq)]
pub struct AbaOutput {
    /// Generalized accelerations, length `nv`.
    pub qdd: DVec,
    /// Joints locked this call because their reduced inertia was singular.
    pub degenerate_joints: Vec<usize>,
}

impl AbaOutput {
    pub fn is_degenerate(&self) -> bool {
        !self.degenerate_joints.is_empty()
    }
}

/// Per-joint data produced by the inward pass and consumed by the final pass.
enum JointSolve {
    Locked,
    Scalar {
        s: SpatialVec,
        u_vec: SpatialVec,
        d: f64,
        u: f64,
    },
    Block {
        s: DMat,
        u_mat: DMat,
        d_inv: DMat,
        u: DVec,
    },
}

/// Run the Articulated Body Algorithm with generalized forces `tau`.
pub fn aba(model: &Model, state: &State, tau: &DVec) -> Result<AbaOutput> {
    aba_with_external_forces(model, state, tau, None)
}

/// Run ABA with optional external spatial forces per link (link coordinates).
pub fn aba_with_external_forces(
    model: &Model,
    state: &State,
    tau: &DVec,
    external_forces: Option<&[SpatialVec]>,
) -> Result<AbaOutput> {
    check_dim("tau", model.nv, tau.len())?;
    if let Some(ext) = external_forces {
        check_dim("external_forces", model.nlinks(), ext.len())?;
    }
    let kin = forward_kinematics(model, state)?;
    let nl = model.nlinks();
    let g0 = gravity_acceleration(model);

    // -- Pass 1: rigid inertias and bias forces --
    let mut i_a: Vec<SpatialMat> = Vec::with_capacity(nl);
    let mut p_a: Vec<SpatialVec> = Vec::with_capacity(nl);
    for i in model.topological_order() {
        let inertia = model.links[i].inertia.to_matrix();
        let vel = &kin.velocities[i];
        let gravity = inertia.mul_vec(&kin.x_world[i].apply_motion(&g0));
        p_a.push(
            vel.cross_force(&inertia.mul_vec(vel)) - gravity - external_force(external_forces, i),
        );
        i_a.push(inertia);
    }

    // -- Pass 2: articulated inertias --
    let mut solves: Vec<JointSolve> = (0..nl).map(|_| JointSolve::Locked).collect();
    let mut degenerate_joints = Vec::new();

    for i in model.reverse_topological_order() {
        let joint = &model.joints[i];
        let off = model.v_offsets[i];
        let ndof = joint.ndof();
        let ia = i_a[i];
        let scale = 1.0 + ia.data.norm();

        let solve = match joint.motion_subspace() {
            _ if ndof == 0 => JointSolve::Locked,
            Some(s) => {
                let u_vec = ia.mul_vec(&s);
                let d = s.dot(&u_vec);
                if d.abs() > DEGENERACY_TOL * scale {
                    let u = tau[off] - joint.damping * state.v[off] - s.dot(&p_a[i]);
                    JointSolve::Scalar { s, u_vec, d, u }
                } else {
                    degenerate_joints.push(i);
                    JointSolve::Locked
                }
            }
            None => {
                let s = model.motion_subspace(i);
                let u_mat = to_dmat(&ia) * &s;
                let d_mat = s.transpose() * &u_mat;
                match invert_spd(&d_mat, scale) {
                    Some(d_inv) => {
                        let tau_i = DVec::from_fn(ndof, |k, _| {
                            tau[off + k] - joint.damping * state.v[off + k]
                        });
                        let u = tau_i - s.transpose() * to_dvec(&p_a[i]);
                        JointSolve::Block { s, u_mat, d_inv, u }
                    }
                    None => {
                        degenerate_joints.push(i);
                        JointSolve::Locked
                    }
                }
            }
        };

        if let Some(parent) = model.parent(i) {
            let c = kin.bias_accelerations[i];
            let (ia_new, p_new) = match &solve {
                JointSolve::Locked => (ia, p_a[i] + ia.mul_vec(&c)),
                JointSolve::Scalar { u_vec, d, u, .. } => {
                    let ia_new = ia - SpatialMat::outer(u_vec, u_vec) * (1.0 / d);
                    (ia_new, p_a[i] + ia_new.mul_vec(&c) + *u_vec * (u / d))
                }
                JointSolve::Block { u_mat, d_inv, u, .. } => {
                    let u_dinv = u_mat * d_inv;
                    let ia_new = ia - to_spatial_mat(&(&u_dinv * u_mat.transpose()));
                    let p_new = p_a[i] + ia_new.mul_vec(&c) + to_spatial(&(&u_dinv * u));
                    (ia_new, p_new)
                }
            };
            let x = &kin.x_tree[i];
            i_a[parent] += x.inertia_to_parent(&ia_new);
            p_a[parent] += x.inv_apply_force(&p_new);
        }
        solves[i] = solve;
    }

    // -- Pass 3: accelerations --
    let mut qdd = DVec::zeros(model.nv);
    let mut acc = vec![SpatialVec::zero(); nl];
    for i in model.topological_order() {
        let a_parent = match model.parent(i) {
            Some(p) => kin.x_tree[i].apply_motion(&acc[p]),
            None => SpatialVec::zero(),
        };
        let a_prime = a_parent + kin.bias_accelerations[i];
        let off = model.v_offsets[i];

        acc[i] = match &solves[i] {
            JointSolve::Locked => a_prime,
            JointSolve::Scalar { s, u_vec, d, u } => {
                let qdd_i = (u - u_vec.dot(&a_prime)) / d;
                qdd[off] = qdd_i;
                a_prime + *s * qdd_i
            }
            JointSolve::Block { s, u_mat, d_inv, u } => {
                let qdd_i = d_inv * (u - u_mat.transpose() * to_dvec(&a_prime));
                qdd.rows_mut(off, qdd_i.len()).copy_from(&qdd_i);
                a_prime + to_spatial(&(s * &qdd_i))
            }
        };
    }

    degenerate_joints.sort_unstable();
    for &j in &degenerate_joints {
        warn!(
            joint = %model.joints[j].name,
            "singular articulated inertia, joint locked for this step"
        );
    }

    Ok(AbaOutput {
        qdd,
        degenerate_joints,
    })
}

/// Inverse of a symmetric positive-definite block, or `None` when it is
/// singular relative to `scale`.
fn invert_spd(d: &DMat, scale: f64) -> Option<DMat> {
    let chol = d.clone().cholesky()?;
    let min_pivot = chol.l_dirty().diagonal().iter().fold(f64::INFINITY, |m, x| m.min(x * x));
    if min_pivot > DEGENERACY_TOL * scale {
        Some(chol.inverse())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{double_pendulum, floating_box, mixed_tree};
    use arbor_math::{GRAVITY, SpatialInertia, SpatialTransform, Vec3};
    use arbor_model::ModelBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn test_pendulum_equilibrium() {
        let model = double_pendulum();
        let state = model.default_state();
        let out = aba(&model, &state, &DVec::zeros(2)).unwrap();
        assert_relative_eq!(out.qdd, DVec::zeros(2), epsilon = 1e-10);
        assert!(!out.is_degenerate());
    }

    #[test]
    fn test_single_pendulum_horizontal() {
        let model = ModelBuilder::new()
            .add_revolute_link(
                "rod",
                None,
                SpatialTransform::identity(),
                Vec3::y(),
                SpatialInertia::point_mass(2.0, Vec3::new(0.0, 0.0, -0.5)),
            )
            .build()
            .unwrap();
        let mut state = model.default_state();
        // Swing to horizontal along -x; gravity pulls it back towards -z.
        state.q[0] = std::f64::consts::FRAC_PI_2;
        let out = aba(&model, &state, &DVec::zeros(1)).unwrap();
        // τ_g = -m g l, I = m l²
        assert_relative_eq!(out.qdd[0], -GRAVITY / 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_free_fall_with_spin() {
        let model = floating_box();
        let mut state = model.default_state();
        let q = arbor_math::Quat::from_axis_angle(&Vec3::new(1.0, 1.0, 0.0).normalize(), 0.7);
        q.write_to(&mut state.q.as_mut_slice()[3..7]);
        let out = aba(&model, &state, &DVec::zeros(6)).unwrap();
        // Body-frame linear acceleration is gravity rotated into the body.
        let g_body = q.to_matrix().transpose() * Vec3::new(0.0, 0.0, -GRAVITY);
        assert_relative_eq!(out.qdd.rows(0, 3).into_owned(), DVec::zeros(3), epsilon = 1e-10);
        assert_relative_eq!(Vec3::new(out.qdd[3], out.qdd[4], out.qdd[5]), g_body, epsilon = 1e-10);
    }

    #[test]
    fn test_damping_opposes_motion() {
        let model = ModelBuilder::new()
            .gravity(Vec3::zeros())
            .add_revolute_link(
                "wheel",
                None,
                SpatialTransform::identity(),
                Vec3::z(),
                SpatialInertia::sphere(1.0, 0.5),
            )
            .damping(0.3)
            .build()
            .unwrap();
        let mut state = model.default_state();
        state.v[0] = 2.0;
        let out = aba(&model, &state, &DVec::zeros(1)).unwrap();
        let inertia = 2.0 / 5.0 * 0.25;
        assert_relative_eq!(out.qdd[0], -0.3 * 2.0 / inertia, epsilon = 1e-10);
    }

    #[test]
    fn test_massless_leaf_is_locked() {
        let model = ModelBuilder::new()
            .add_revolute_link(
                "arm",
                None,
                SpatialTransform::identity(),
                Vec3::y(),
                SpatialInertia::point_mass(1.0, Vec3::new(0.0, 0.0, -1.0)),
            )
            .add_revolute_link(
                "ghost",
                Some(0),
                SpatialTransform::identity(),
                Vec3::x(),
                SpatialInertia::zero(),
            )
            .build()
            .unwrap();
        let mut state = model.default_state();
        state.q[0] = 0.4;
        let out = aba(&model, &state, &DVec::zeros(2)).unwrap();
        assert_eq!(out.degenerate_joints, vec![1]);
        assert_eq!(out.qdd[1], 0.0);
        assert!(out.qdd[0].is_finite());
        // The rest of the tree behaves as if the ghost link were absent.
        let expected = -GRAVITY * 0.4_f64.sin();
        assert_relative_eq!(out.qdd[0], expected, epsilon = 1e-9);
    }

    #[test]
    fn test_external_force_on_free_body() {
        let model = floating_box();
        let state = model.default_state();
        let mut ext = vec![SpatialVec::zero(); 1];
        // Push up with exactly the weight: the body hovers.
        ext[0] = SpatialVec::new(Vec3::zeros(), Vec3::new(0.0, 0.0, 2.0 * GRAVITY));
        let out = aba_with_external_forces(&model, &state, &DVec::zeros(6), Some(&ext)).unwrap();
        assert_relative_eq!(out.qdd, DVec::zeros(6), epsilon = 1e-10);
    }

    #[test]
    fn test_dimension_errors() {
        let model = mixed_tree();
        let state = model.default_state();
        assert!(aba(&model, &state, &DVec::zeros(model.nv + 1)).is_err());
        let ext = vec![SpatialVec::zero(); 1];
        assert!(
            aba_with_external_forces(&model, &state, &DVec::zeros(model.nv), Some(&ext)).is_err()
        );
    }
}

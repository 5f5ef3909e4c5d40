//! Composite Rigid Body Algorithm (CRBA) -- mass matrix computation.

use crate::kinematics::forward_kinematics;
use crate::{to_dmat, to_spatial};
use arbor_math::{DMat, SpatialMat, SpatialTransform, SpatialVec};
use arbor_model::{Model, Result, State};

/// Compute the joint-space mass matrix M(q).
///
/// Returns an nv × nv symmetric positive semi-definite matrix.
pub fn crba(model: &Model, state: &State) -> Result<DMat> {
    let kin = forward_kinematics(model, state)?;
    let mut mass_matrix = DMat::zeros(model.nv, model.nv);

    // Composite inertias, accumulated leaves first.
    let mut i_c: Vec<SpatialMat> = model.links.iter().map(|l| l.inertia.to_matrix()).collect();
    for i in model.reverse_topological_order() {
        if let Some(p) = model.parent(i) {
            let ic = kin.x_tree[i].inertia_to_parent(&i_c[i]);
            i_c[p] += ic;
        }
    }

    for i in model.topological_order() {
        let ndof_i = model.joints[i].ndof();
        if ndof_i == 0 {
            continue;
        }
        let vi = model.v_offsets[i];
        let s_i = model.motion_subspace(i);

        // F = I_c S_i, one spatial force per DOF of joint i.
        let mut f = to_dmat(&i_c[i]) * &s_i;
        mass_matrix
            .view_mut((vi, vi), (ndof_i, ndof_i))
            .copy_from(&(s_i.transpose() * &f));

        // Off-diagonal blocks: carry F up the support chain.
        let mut child = i;
        while let Some(j) = model.parent(child) {
            f = forces_to_parent(&kin.x_tree[child], &f);
            let ndof_j = model.joints[j].ndof();
            if ndof_j > 0 {
                let vj = model.v_offsets[j];
                let block = model.motion_subspace(j).transpose() * &f;
                mass_matrix.view_mut((vj, vi), (ndof_j, ndof_i)).copy_from(&block);
                mass_matrix
                    .view_mut((vi, vj), (ndof_i, ndof_j))
                    .copy_from(&block.transpose());
            }
            child = j;
        }
    }

    Ok(mass_matrix)
}

/// Apply `x⁻¹` (child → parent) to every column of a 6 × n force block.
fn forces_to_parent(x: &SpatialTransform, f: &DMat) -> DMat {
    let mut out = DMat::zeros(6, f.ncols());
    for (k, col) in f.column_iter().enumerate() {
        let mapped: SpatialVec = x.inv_apply_force(&to_spatial(&col.into_owned()));
        out.set_column(k, &crate::to_dvec(&mapped));
    }
    out
}

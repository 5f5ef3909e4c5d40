//! Link Jacobians.

use crate::kinematics::{LinkKinematics, forward_kinematics};
use crate::{to_dvec, to_spatial};
use arbor_math::DMat;
use arbor_model::{Error, Model, Result, State};

/// Jacobian of `link`'s spatial velocity, in link coordinates (6 × nv).
///
/// Column block of joint `j` on the support chain is `X_{link←j} S_j`; all
/// other columns are zero, so `J v` equals the link's spatial velocity.
pub fn link_jacobian(model: &Model, state: &State, link: usize) -> Result<DMat> {
    if link >= model.nlinks() {
        return Err(Error::ShapeMismatch {
            what: "link index",
            expected: model.nlinks(),
            actual: link,
        });
    }
    let kin = forward_kinematics(model, state)?;
    Ok(jacobian_from_kinematics(model, &kin, link))
}

fn jacobian_from_kinematics(model: &Model, kin: &LinkKinematics, link: usize) -> DMat {
    let mut jac = DMat::zeros(6, model.nv);
    for j in model.ancestors(link) {
        let ndof = model.joints[j].ndof();
        if ndof == 0 {
            continue;
        }
        // X_{link←j} = X_{link←0} X_{0←j}
        let x = kin.x_world[link].compose(&kin.x_world[j].inverse());
        let s = model.motion_subspace(j);
        for k in 0..ndof {
            let col = x.apply_motion(&to_spatial(&s.column(k).into_owned()));
            jac.set_column(model.v_offsets[j] + k, &to_dvec(&col));
        }
    }
    jac
}
